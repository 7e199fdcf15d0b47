//! Value serializers for named types.
//!
//! A [`ValueSerializer`] converts between one named type's [`ClientValue`]
//! and its JSON wire form. Scalars are leaves; input objects delegate to the
//! serializers of their field types through handles resolved during
//! [`ValueSerializer::initialize`].

use crate::registry::{SerializerLookup, SerializerRegistry};
use serde_json::{Number, Value};
use tgql_core::{ClientValue, Error, ErrorCode, Result};

/// The closed set of serializer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerializerKind {
    /// Leaf types: built-in scalars, enums, custom scalars.
    Scalar,
    /// Composite input objects.
    InputObject,
}

/// Index of a serializer inside a frozen [`SerializerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SerializerHandle(pub(crate) usize);

/// Conversion between a named type's client value and its wire value.
///
/// Lifecycle: constructed uninitialized, then [`initialize`](Self::initialize)
/// is called exactly once by the registry, then `serialize`/`deserialize`.
pub trait ValueSerializer: Send + Sync {
    /// The named type this serializer is bound to.
    fn name(&self) -> &str;

    fn kind(&self) -> SerializerKind;

    /// Describes the client value accepted and produced.
    fn client_kind(&self) -> &'static str;

    /// Resolves and caches handles to the serializers this one depends on.
    ///
    /// A second call fails with [`ErrorCode::AlreadyInitialized`].
    fn initialize(&mut self, lookup: &SerializerLookup<'_>) -> Result<()>;

    /// Converts a client value into its wire representation.
    fn serialize(&self, value: &ClientValue, registry: &SerializerRegistry) -> Result<Value>;

    /// Converts a wire value into a client value.
    fn deserialize(&self, value: &Value, registry: &SerializerRegistry) -> Result<ClientValue>;
}

/// Tracks the one-shot initialization of a serializer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lifecycle {
    initialized: bool,
}

impl Lifecycle {
    /// Marks the serializer initialized, rejecting a second call.
    pub fn begin(&mut self, name: &str) -> Result<()> {
        if self.initialized {
            return Err(Error::new(
                ErrorCode::AlreadyInitialized,
                format!("`{name}` was already initialized"),
            ));
        }
        self.initialized = true;
        Ok(())
    }

    /// Fails if initialization has not happened yet.
    pub fn ensure(&self, name: &str) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::not_initialized(name))
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

fn type_mismatch(type_name: &str, expected: &str, found: &str) -> Error {
    Error::serialize(format!(
        "`{type_name}` expects {expected}, found {found}"
    ))
}

fn wire_mismatch(type_name: &str, expected: &str, found: &Value) -> Error {
    Error::deserialize(format!(
        "`{type_name}` expects {expected} on the wire, found {}",
        wire_kind(found)
    ))
}

pub(crate) fn wire_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Built-in scalars
// ============================================================================

/// The scalars every GraphQL schema defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinScalar {
    Int,
    Float,
    String,
    Boolean,
    Id,
}

impl BuiltinScalar {
    pub const ALL: [BuiltinScalar; 5] = [
        Self::Int,
        Self::Float,
        Self::String,
        Self::Boolean,
        Self::Id,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
            Self::Id => "ID",
        }
    }
}

/// Serializer for a [`BuiltinScalar`].
#[derive(Debug, Clone)]
pub struct ScalarSerializer {
    scalar: BuiltinScalar,
    lifecycle: Lifecycle,
}

impl ScalarSerializer {
    pub fn new(scalar: BuiltinScalar) -> Self {
        Self {
            scalar,
            lifecycle: Lifecycle::default(),
        }
    }

    fn int32(&self, value: i64) -> Result<i64> {
        if i32::try_from(value).is_ok() {
            Ok(value)
        } else {
            Err(Error::serialize(format!(
                "`{}` cannot represent {value}: outside the 32-bit range",
                self.scalar.name()
            )))
        }
    }
}

impl ValueSerializer for ScalarSerializer {
    fn name(&self) -> &str {
        self.scalar.name()
    }

    fn kind(&self) -> SerializerKind {
        SerializerKind::Scalar
    }

    fn client_kind(&self) -> &'static str {
        match self.scalar {
            BuiltinScalar::Int => "int",
            BuiltinScalar::Float => "float",
            BuiltinScalar::String | BuiltinScalar::Id => "string",
            BuiltinScalar::Boolean => "boolean",
        }
    }

    fn initialize(&mut self, _lookup: &SerializerLookup<'_>) -> Result<()> {
        self.lifecycle.begin(self.scalar.name())
    }

    fn serialize(&self, value: &ClientValue, _registry: &SerializerRegistry) -> Result<Value> {
        let name = self.scalar.name();
        self.lifecycle.ensure(name)?;

        match (self.scalar, value) {
            (_, ClientValue::Null) => Ok(Value::Null),
            (BuiltinScalar::Int, ClientValue::Int(i)) => Ok(Value::from(self.int32(*i)?)),
            (BuiltinScalar::Float, ClientValue::Float(f)) => Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| Error::serialize(format!("`Float` cannot represent {f}"))),
            #[allow(clippy::cast_precision_loss)]
            (BuiltinScalar::Float, ClientValue::Int(i)) => Ok(Value::from(*i as f64)),
            (BuiltinScalar::String | BuiltinScalar::Id, ClientValue::String(s)) => {
                Ok(Value::String(s.clone()))
            }
            (BuiltinScalar::Id, ClientValue::Int(i)) => Ok(Value::String(i.to_string())),
            (BuiltinScalar::Boolean, ClientValue::Boolean(b)) => Ok(Value::Bool(*b)),
            (_, other) => Err(type_mismatch(name, self.client_kind(), other.kind())),
        }
    }

    fn deserialize(&self, value: &Value, _registry: &SerializerRegistry) -> Result<ClientValue> {
        let name = self.scalar.name();
        self.lifecycle.ensure(name)?;

        match (self.scalar, value) {
            (_, Value::Null) => Ok(ClientValue::Null),
            (BuiltinScalar::Int, Value::Number(n)) => n
                .as_i64()
                .filter(|i| i32::try_from(*i).is_ok())
                .map(ClientValue::Int)
                .ok_or_else(|| wire_mismatch(name, "a 32-bit integer", value)),
            (BuiltinScalar::Float, Value::Number(n)) => n
                .as_f64()
                .map(ClientValue::Float)
                .ok_or_else(|| wire_mismatch(name, "a float", value)),
            (BuiltinScalar::String | BuiltinScalar::Id, Value::String(s)) => {
                Ok(ClientValue::String(s.clone()))
            }
            (BuiltinScalar::Id, Value::Number(n)) if n.is_i64() || n.is_u64() => {
                Ok(ClientValue::String(n.to_string()))
            }
            (BuiltinScalar::Boolean, Value::Bool(b)) => Ok(ClientValue::Boolean(*b)),
            (_, other) => Err(wire_mismatch(name, self.client_kind(), other)),
        }
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Serializer for an enum type with a fixed value set.
#[derive(Debug, Clone)]
pub struct EnumSerializer {
    name: String,
    values: Vec<String>,
    lifecycle: Lifecycle,
}

impl EnumSerializer {
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            lifecycle: Lifecycle::default(),
        }
    }

    fn check(&self, candidate: &str) -> bool {
        self.values.iter().any(|v| v == candidate)
    }
}

impl ValueSerializer for EnumSerializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SerializerKind {
        SerializerKind::Scalar
    }

    fn client_kind(&self) -> &'static str {
        "enum"
    }

    fn initialize(&mut self, _lookup: &SerializerLookup<'_>) -> Result<()> {
        self.lifecycle.begin(&self.name)
    }

    fn serialize(&self, value: &ClientValue, _registry: &SerializerRegistry) -> Result<Value> {
        self.lifecycle.ensure(&self.name)?;
        match value {
            ClientValue::Null => Ok(Value::Null),
            ClientValue::Enum(v) | ClientValue::String(v) if self.check(v) => {
                Ok(Value::String(v.clone()))
            }
            ClientValue::Enum(v) | ClientValue::String(v) => Err(Error::serialize(format!(
                "`{v}` is not a value of enum `{}`",
                self.name
            ))),
            other => Err(type_mismatch(&self.name, "enum", other.kind())),
        }
    }

    fn deserialize(&self, value: &Value, _registry: &SerializerRegistry) -> Result<ClientValue> {
        self.lifecycle.ensure(&self.name)?;
        match value {
            Value::Null => Ok(ClientValue::Null),
            Value::String(v) if self.check(v) => Ok(ClientValue::Enum(v.clone())),
            Value::String(v) => Err(Error::deserialize(format!(
                "`{v}` is not a value of enum `{}`",
                self.name
            ))),
            other => Err(wire_mismatch(&self.name, "an enum string", other)),
        }
    }
}

// ============================================================================
// Custom scalars
// ============================================================================

/// Converts a client value into a custom scalar's wire value.
pub type SerializeFn = fn(&ClientValue) -> Result<Value>;

/// Converts a custom scalar's wire value into a client value.
pub type DeserializeFn = fn(&Value) -> Result<ClientValue>;

/// Serializer for a schema-defined scalar such as `DateTime` or `JSON`.
///
/// Without explicit conversions the wire value passes through as
/// [`ClientValue::Json`].
#[derive(Debug, Clone)]
pub struct CustomScalarSerializer {
    name: String,
    serialize_fn: SerializeFn,
    deserialize_fn: DeserializeFn,
    lifecycle: Lifecycle,
}

impl CustomScalarSerializer {
    /// A pass-through scalar.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_conversions(name, passthrough_serialize, passthrough_deserialize)
    }

    pub fn with_conversions(
        name: impl Into<String>,
        serialize_fn: SerializeFn,
        deserialize_fn: DeserializeFn,
    ) -> Self {
        Self {
            name: name.into(),
            serialize_fn,
            deserialize_fn,
            lifecycle: Lifecycle::default(),
        }
    }
}

fn passthrough_serialize(value: &ClientValue) -> Result<Value> {
    match value {
        ClientValue::Json(json) => Ok(json.clone()),
        ClientValue::Null => Ok(Value::Null),
        ClientValue::Boolean(b) => Ok(Value::Bool(*b)),
        ClientValue::Int(i) => Ok(Value::from(*i)),
        ClientValue::Float(f) => Ok(Value::from(*f)),
        ClientValue::String(s) | ClientValue::Enum(s) => Ok(Value::String(s.clone())),
        other => Err(Error::serialize(format!(
            "custom scalars cannot carry a client {}",
            other.kind()
        ))),
    }
}

fn passthrough_deserialize(value: &Value) -> Result<ClientValue> {
    Ok(ClientValue::Json(value.clone()))
}

impl ValueSerializer for CustomScalarSerializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SerializerKind {
        SerializerKind::Scalar
    }

    fn client_kind(&self) -> &'static str {
        "custom scalar"
    }

    fn initialize(&mut self, _lookup: &SerializerLookup<'_>) -> Result<()> {
        self.lifecycle.begin(&self.name)
    }

    fn serialize(&self, value: &ClientValue, _registry: &SerializerRegistry) -> Result<Value> {
        self.lifecycle.ensure(&self.name)?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        (self.serialize_fn)(value)
    }

    fn deserialize(&self, value: &Value, _registry: &SerializerRegistry) -> Result<ClientValue> {
        self.lifecycle.ensure(&self.name)?;
        if value.is_null() {
            return Ok(ClientValue::Null);
        }
        (self.deserialize_fn)(value)
    }
}
