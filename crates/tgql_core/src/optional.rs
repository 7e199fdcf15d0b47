//! Three-state optional values.
//!
//! GraphQL inputs distinguish "not sent" from "sent as null". `Option<T>`
//! only has two states, so every input field and top-level argument is an
//! [`OptionalValue`] instead.

/// An input value that may be unset, explicitly null, or present.
///
/// ```
/// use tgql_core::OptionalValue;
///
/// let unset: OptionalValue<i32> = OptionalValue::Unset;
/// let null: OptionalValue<i32> = None.into();
/// let three = OptionalValue::Value(3);
///
/// assert!(!unset.is_set());
/// assert!(null.is_set() && null.is_null());
/// assert_eq!(three.value(), Some(&3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OptionalValue<T> {
    /// Omitted from the wire entirely.
    #[default]
    Unset,
    /// Sent as an explicit `null`.
    Null,
    /// Sent as the converted value.
    Value(T),
}

impl<T> OptionalValue<T> {
    /// Wraps a present value.
    pub fn set(value: T) -> Self {
        Self::Value(value)
    }

    /// `Some(v)` becomes `Value(v)`, `None` becomes `Null`.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Null,
        }
    }

    /// Returns true for `Null` and `Value`.
    pub fn is_set(&self) -> bool {
        !self.is_unset()
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the present value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unset | Self::Null => None,
        }
    }

    /// Consumes self, returning the present value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unset | Self::Null => None,
        }
    }

    pub fn as_ref(&self) -> OptionalValue<&T> {
        match self {
            Self::Unset => OptionalValue::Unset,
            Self::Null => OptionalValue::Null,
            Self::Value(v) => OptionalValue::Value(v),
        }
    }

    /// Maps a present value, keeping `Unset` and `Null` as they are.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> OptionalValue<U> {
        match self {
            Self::Unset => OptionalValue::Unset,
            Self::Null => OptionalValue::Null,
            Self::Value(v) => OptionalValue::Value(f(v)),
        }
    }

    /// Collapses to two states: `None` when unset, `Some(None)` when null.
    pub fn into_nullable(self) -> Option<Option<T>> {
        match self {
            Self::Unset => None,
            Self::Null => Some(None),
            Self::Value(v) => Some(Some(v)),
        }
    }
}

impl<T> From<Option<T>> for OptionalValue<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_option(value)
    }
}
