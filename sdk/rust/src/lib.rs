//! tgql SDK
//!
//! This crate provides the client-facing API for typed GraphQL operations:
//! a [`Client`] that validates arguments and drives the execution pipeline,
//! the [`TypedOperation`] contract generated code implements, and an HTTP
//! transport.
//!
//! # Typed Client
//!
//! ```ignore
//! use tgql_sdk::{Client, HttpTransport, TransportConfig};
//!
//! let transport = HttpTransport::new(TransportConfig::new("http://localhost:4000/graphql"))?;
//! let client = Client::builder(parsers, Arc::new(transport))
//!     .documents(documents)
//!     .build()?;
//!
//! let response = client
//!     .execute::<CreateReview>(variables, CancellationToken::new())
//!     .await?;
//! if response.is_partial() {
//!     for error in &response.errors {
//!         eprintln!("{}", error.message);
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod http;
pub mod typed;

pub use client::{Client, ClientBuilder};
pub use config::{RetryPolicy, TransportConfig};
pub use http::HttpTransport;
pub use typed::{
    require_non_null, NoVariables, OperationResponse, OperationVariables, TypedOperation,
};

// Re-export the types generated code needs
pub use tgql_core::{
    ClientValue, Error, ErrorCategory, ErrorCode, FromClientValue, InputObject, IntoClientValue,
    OptionalValue, PathSegment, Result, ResultExt,
};
pub use tgql_runtime::{
    DocumentRef, DocumentStore, GraphQLError, InputObjectSerializer, Nested, ObjectField,
    ObjectReader, OperationDefinition, OperationKind, ParserRegistry, ResultParser, ScalarField,
    SerializerRegistry, StaticDocuments, Transport, Variable,
};
pub use tokio_util::sync::CancellationToken;
