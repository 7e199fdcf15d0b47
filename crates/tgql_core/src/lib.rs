//! Core types for tgql.
//!
//! This crate provides the foundational types shared by the runtime and SDK:
//! - `optional`: Three-state input values
//! - `types`: Declared type references
//! - `value`: Client-side values and conversions
//! - `error`: Typed errors

pub mod error;
pub mod optional;
pub mod types;
pub mod value;

pub use error::{Error, ErrorCategory, ErrorCode, PathSegment, Result, ResultExt};
pub use optional::OptionalValue;
pub use types::TypeRef;
pub use value::{ClientValue, FromClientValue, InputObject, IntoClientValue};
