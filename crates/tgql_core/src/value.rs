//! Client-side values handled by the serializer engine.
//!
//! Generated input types convert into [`ClientValue`] through
//! [`IntoClientValue`]; scalar results convert back out through
//! [`FromClientValue`].

use crate::error::{Error, ErrorCode, Result};
use crate::optional::OptionalValue;
use indexmap::IndexMap;

/// A value on the client side of a serializer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ClientValue {
    #[default]
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// An enum value by name.
    Enum(String),
    List(Vec<ClientValue>),
    /// An input object with per-field tri-state.
    Object(InputObject),
    /// Opaque payload for custom scalars.
    Json(serde_json::Value),
}

impl ClientValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Enum(_) => "enum",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Json(_) => "json",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Fields of an input object value, keyed by wire name, in insertion order.
///
/// A field that was never inserted reads as [`OptionalValue::Unset`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InputObject {
    fields: IndexMap<String, OptionalValue<ClientValue>>,
}

impl InputObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a field. `Unset` values are not stored.
    #[must_use]
    pub fn field<T: IntoClientValue>(mut self, name: impl Into<String>, value: OptionalValue<T>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: IntoClientValue>(&mut self, name: impl Into<String>, value: OptionalValue<T>) {
        let name = name.into();
        match value.map(IntoClientValue::into_client_value) {
            OptionalValue::Unset => {
                self.fields.shift_remove(&name);
            }
            // A present client-side null is still an explicit null.
            OptionalValue::Value(ClientValue::Null) | OptionalValue::Null => {
                self.fields.insert(name, OptionalValue::Null);
            }
            value => {
                self.fields.insert(name, value);
            }
        }
    }

    /// Returns the state of a field.
    pub fn get(&self, name: &str) -> OptionalValue<&ClientValue> {
        self.fields
            .get(name)
            .map_or(OptionalValue::Unset, OptionalValue::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Names of every set field.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<InputObject> for ClientValue {
    fn from(object: InputObject) -> Self {
        Self::Object(object)
    }
}

/// Conversion of a typed client value into a [`ClientValue`].
pub trait IntoClientValue {
    fn into_client_value(self) -> ClientValue;
}

impl IntoClientValue for ClientValue {
    fn into_client_value(self) -> ClientValue {
        self
    }
}

impl IntoClientValue for InputObject {
    fn into_client_value(self) -> ClientValue {
        ClientValue::Object(self)
    }
}

impl IntoClientValue for bool {
    fn into_client_value(self) -> ClientValue {
        ClientValue::Boolean(self)
    }
}

impl IntoClientValue for i32 {
    fn into_client_value(self) -> ClientValue {
        ClientValue::Int(i64::from(self))
    }
}

impl IntoClientValue for i64 {
    fn into_client_value(self) -> ClientValue {
        ClientValue::Int(self)
    }
}

impl IntoClientValue for f64 {
    fn into_client_value(self) -> ClientValue {
        ClientValue::Float(self)
    }
}

impl IntoClientValue for String {
    fn into_client_value(self) -> ClientValue {
        ClientValue::String(self)
    }
}

impl IntoClientValue for &str {
    fn into_client_value(self) -> ClientValue {
        ClientValue::String(self.to_string())
    }
}

impl IntoClientValue for serde_json::Value {
    fn into_client_value(self) -> ClientValue {
        ClientValue::Json(self)
    }
}

impl<T: IntoClientValue> IntoClientValue for Option<T> {
    fn into_client_value(self) -> ClientValue {
        self.map_or(ClientValue::Null, IntoClientValue::into_client_value)
    }
}

impl<T: IntoClientValue> IntoClientValue for Vec<T> {
    fn into_client_value(self) -> ClientValue {
        ClientValue::List(self.into_iter().map(IntoClientValue::into_client_value).collect())
    }
}

/// Conversion of a deserialized [`ClientValue`] into a typed result field.
pub trait FromClientValue: Sized {
    fn from_client_value(value: ClientValue) -> Result<Self>;
}

fn mismatch(expected: &str, value: &ClientValue) -> Error {
    Error::deserialize(format!("expected {expected}, found {}", value.kind()))
}

impl FromClientValue for ClientValue {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        Ok(value)
    }
}

impl FromClientValue for bool {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        match value {
            ClientValue::Boolean(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromClientValue for i64 {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        match value {
            ClientValue::Int(i) => Ok(i),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl FromClientValue for i32 {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        let wide = i64::from_client_value(value)?;
        i32::try_from(wide).map_err(|_| {
            Error::new(
                ErrorCode::DeserializeError,
                format!("{wide} does not fit in a 32-bit integer"),
            )
        })
    }
}

impl FromClientValue for f64 {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        match value {
            ClientValue::Float(f) => Ok(f),
            #[allow(clippy::cast_precision_loss)]
            ClientValue::Int(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromClientValue for String {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        match value {
            ClientValue::String(s) | ClientValue::Enum(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl FromClientValue for serde_json::Value {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        match value {
            ClientValue::Json(json) => Ok(json),
            ClientValue::Null => Ok(serde_json::Value::Null),
            ClientValue::Boolean(b) => Ok(b.into()),
            ClientValue::Int(i) => Ok(i.into()),
            ClientValue::Float(f) => Ok(f.into()),
            ClientValue::String(s) | ClientValue::Enum(s) => Ok(s.into()),
            other => Err(mismatch("json", &other)),
        }
    }
}

impl<T: FromClientValue> FromClientValue for Option<T> {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        match value {
            ClientValue::Null => Ok(None),
            other => T::from_client_value(other).map(Some),
        }
    }
}

impl<T: FromClientValue> FromClientValue for Vec<T> {
    fn from_client_value(value: ClientValue) -> Result<Self> {
        match value {
            ClientValue::List(items) => items.into_iter().map(T::from_client_value).collect(),
            ClientValue::Null => Err(Error::new(ErrorCode::NullValue, "expected list, found null")),
            other => Err(mismatch("list", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_object_tracks_tri_state() {
        let object = InputObject::new()
            .field("a", OptionalValue::set(1))
            .field("b", OptionalValue::<i32>::Null)
            .field("c", OptionalValue::<i32>::Unset);

        assert_eq!(object.get("a"), OptionalValue::Value(&ClientValue::Int(1)));
        assert_eq!(object.get("b"), OptionalValue::Null);
        assert_eq!(object.get("c"), OptionalValue::Unset);
        assert_eq!(object.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_input_object_unset_removes_field() {
        let mut object = InputObject::new().field("a", OptionalValue::set("x"));
        object.insert("a", OptionalValue::<String>::Unset);
        assert!(object.is_empty());
    }

    #[test]
    fn test_present_none_is_null() {
        let object = InputObject::new().field("a", OptionalValue::set(None::<i32>));
        assert_eq!(object.get("a"), OptionalValue::Null);
    }

    #[test]
    fn test_from_client_value_scalars() {
        assert_eq!(String::from_client_value(ClientValue::Enum("JEDI".into())).unwrap(), "JEDI");
        assert!((f64::from_client_value(ClientValue::Int(2)).unwrap() - 2.0).abs() < f64::EPSILON);
        assert_eq!(Option::<i32>::from_client_value(ClientValue::Null).unwrap(), None);

        let err = i32::from_client_value(ClientValue::Int(i64::from(i32::MAX) + 1)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
    }

    #[test]
    fn test_from_client_value_lists() {
        let value = ClientValue::List(vec![ClientValue::Int(1), ClientValue::Null]);
        let items = Vec::<Option<i64>>::from_client_value(value).unwrap();
        assert_eq!(items, vec![Some(1), None]);

        let err = Vec::<i64>::from_client_value(ClientValue::Boolean(true)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
    }
}
