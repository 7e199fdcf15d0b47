//! Serializer registry.
//!
//! Serializers are collected on a [`SerializerRegistryBuilder`]; `build()`
//! indexes them by name and runs one initialization pass in which every
//! serializer resolves the names it references into [`SerializerHandle`]s.
//! Handles index into the frozen registry, so self-referential and mutually
//! referential input objects need no recursive construction.

use crate::serializer::{
    BuiltinScalar, ScalarSerializer, SerializerHandle, SerializerKind, ValueSerializer,
};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tgql_core::{ClientValue, Error, ErrorCode, PathSegment, Result, TypeRef};
use tracing::debug;

/// Collects serializers before the initialization pass.
#[derive(Default)]
pub struct SerializerRegistryBuilder {
    serializers: Vec<Box<dyn ValueSerializer>>,
}

impl SerializerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `Int`, `Float`, `String`, `Boolean` and `ID`.
    #[must_use]
    pub fn with_builtin_scalars(mut self) -> Self {
        for scalar in BuiltinScalar::ALL {
            self.serializers.push(Box::new(ScalarSerializer::new(scalar)));
        }
        self
    }

    /// Adds a serializer.
    #[must_use]
    pub fn register<S: ValueSerializer + 'static>(mut self, serializer: S) -> Self {
        self.serializers.push(Box::new(serializer));
        self
    }

    /// Adds an already boxed serializer.
    #[must_use]
    pub fn register_boxed(mut self, serializer: Box<dyn ValueSerializer>) -> Self {
        self.serializers.push(serializer);
        self
    }

    /// Indexes every serializer, initializes each once, and freezes the result.
    ///
    /// Fails with a configuration error on duplicate names or on any
    /// reference to an unregistered type.
    pub fn build(self) -> Result<SerializerRegistry> {
        let mut serializers = self.serializers;

        let mut index = FxHashMap::default();
        for (position, serializer) in serializers.iter().enumerate() {
            if index.insert(serializer.name().to_string(), position).is_some() {
                return Err(Error::new(
                    ErrorCode::DuplicateType,
                    format!("Type `{}` is registered twice", serializer.name()),
                ));
            }
        }

        let lookup = SerializerLookup { index: &index };
        for serializer in &mut serializers {
            serializer.initialize(&lookup).map_err(|e| {
                Error::new(
                    e.code,
                    format!("Failed to initialize `{}`: {}", serializer.name(), e.message),
                )
                .with_source(e)
            })?;
        }

        let input_objects = serializers
            .iter()
            .filter(|s| s.kind() == SerializerKind::InputObject)
            .count();
        debug!(
            serializers = serializers.len(),
            input_objects, "serializer registry initialized"
        );

        Ok(SerializerRegistry { serializers, index })
    }
}

/// Name resolution available to serializers during initialization.
pub struct SerializerLookup<'a> {
    index: &'a FxHashMap<String, usize>,
}

impl SerializerLookup<'_> {
    /// Resolves a type name to a handle.
    pub fn resolve(&self, name: &str) -> Result<SerializerHandle> {
        self.index
            .get(name)
            .copied()
            .map(SerializerHandle)
            .ok_or_else(|| Error::type_not_found(name))
    }

    /// Resolves the named type inside a type reference.
    pub fn resolve_type(&self, ty: &TypeRef) -> Result<SerializerHandle> {
        self.resolve(ty.named_type())
    }
}

/// A frozen, initialized set of serializers keyed by type name.
///
/// Read-only after [`SerializerRegistryBuilder::build`]; share it across
/// calls behind an `Arc`.
pub struct SerializerRegistry {
    serializers: Vec<Box<dyn ValueSerializer>>,
    index: FxHashMap<String, usize>,
}

impl std::fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("types", &self.serializers.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl SerializerRegistry {
    pub fn builder() -> SerializerRegistryBuilder {
        SerializerRegistryBuilder::new()
    }

    /// Resolves a serializer by type name.
    pub fn resolve(&self, name: &str) -> Result<&dyn ValueSerializer> {
        self.handle(name).and_then(|handle| self.get(handle))
    }

    /// Resolves a type name to a handle.
    pub fn handle(&self, name: &str) -> Result<SerializerHandle> {
        self.index
            .get(name)
            .copied()
            .map(SerializerHandle)
            .ok_or_else(|| Error::type_not_found(name))
    }

    /// Dereferences a handle.
    pub fn get(&self, handle: SerializerHandle) -> Result<&dyn ValueSerializer> {
        self.serializers
            .get(handle.0)
            .map(|serializer| &**serializer)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::NotInitialized,
                    format!("Serializer handle {} does not belong to this registry", handle.0),
                )
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }

    /// Serializes `value` as `ty`, walking list and non-null wrappers down to
    /// the named type's serializer.
    ///
    /// Nullability is not enforced here: a null at any depth is written as
    /// `null`. A non-list value given for a list type is coerced to a list of
    /// one, as GraphQL input coercion does.
    pub fn serialize_typed(
        &self,
        ty: &TypeRef,
        handle: SerializerHandle,
        value: &ClientValue,
    ) -> Result<Value> {
        match (ty, value) {
            (_, ClientValue::Null) => Ok(Value::Null),
            (TypeRef::NonNull(inner), value) => self.serialize_typed(inner, handle, value),
            (TypeRef::List(inner), ClientValue::List(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    self.serialize_typed(inner, handle, item).map_err(|mut e| {
                        e.path.insert(0, PathSegment::Index(index));
                        e
                    })
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            (TypeRef::List(inner), single) => {
                Ok(Value::Array(vec![self.serialize_typed(inner, handle, single)?]))
            }
            (TypeRef::Named(_), value) => self.get(handle)?.serialize(value, self),
        }
    }

    /// Deserializes `raw` as `ty`, enforcing non-null wrappers.
    ///
    /// `path` locates `raw` in the response and is attached to any error.
    pub fn deserialize_typed(
        &self,
        ty: &TypeRef,
        handle: SerializerHandle,
        raw: &Value,
        path: &mut Vec<PathSegment>,
    ) -> Result<ClientValue> {
        match ty {
            TypeRef::NonNull(inner) => {
                if raw.is_null() {
                    return Err(null_value(ty, path));
                }
                self.deserialize_typed(inner, handle, raw, path)
            }
            _ if raw.is_null() => Ok(ClientValue::Null),
            TypeRef::List(inner) => {
                let Value::Array(items) = raw else {
                    return Err(Error::deserialize(format!(
                        "expected a list for `{ty}`, found {}",
                        crate::serializer::wire_kind(raw)
                    ))
                    .with_path(path.clone()));
                };
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    let value = self.deserialize_typed(inner, handle, item, path);
                    path.pop();
                    values.push(value?);
                }
                Ok(ClientValue::List(values))
            }
            TypeRef::Named(_) => self
                .get(handle)?
                .deserialize(raw, self)
                .map_err(|e| if e.path.is_empty() { e.with_path(path.clone()) } else { e }),
        }
    }
}

pub(crate) fn null_value(ty: &TypeRef, path: &[PathSegment]) -> Error {
    Error::new(
        ErrorCode::NullValue,
        format!("null received for non-nullable `{ty}`"),
    )
    .with_path(path.to_vec())
}
