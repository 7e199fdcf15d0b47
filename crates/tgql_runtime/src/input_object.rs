//! Serializer for composite input object types.

use crate::registry::{SerializerLookup, SerializerRegistry};
use crate::serializer::{SerializerHandle, SerializerKind, ValueSerializer};
use serde_json::{Map, Value};
use tgql_core::{ClientValue, Error, OptionalValue, PathSegment, Result, TypeRef};

/// A declared input field, before resolution.
#[derive(Debug, Clone)]
struct FieldDeclaration {
    name: String,
    declared_type: String,
}

/// A field whose type has been parsed and resolved.
#[derive(Debug, Clone)]
struct ResolvedField {
    name: String,
    ty: TypeRef,
    handle: SerializerHandle,
}

/// Serializes input objects field by field, emitting only set fields.
///
/// ```
/// use serde_json::json;
/// use tgql_core::{ClientValue, InputObject, OptionalValue};
/// use tgql_runtime::{InputObjectSerializer, SerializerRegistry};
///
/// let registry = SerializerRegistry::builder()
///     .with_builtin_scalars()
///     .register(InputObjectSerializer::new("Point").field("x", "Int!").field("y", "Int"))
///     .build()
///     .unwrap();
///
/// let point = InputObject::new()
///     .field("x", OptionalValue::set(1))
///     .field("y", OptionalValue::<i32>::Null);
/// let wire = registry
///     .resolve("Point")
///     .unwrap()
///     .serialize(&ClientValue::Object(point), &registry)
///     .unwrap();
/// assert_eq!(wire, json!({"x": 1, "y": null}));
/// ```
#[derive(Debug, Clone)]
pub struct InputObjectSerializer {
    name: String,
    declarations: Vec<FieldDeclaration>,
    resolved: Option<Vec<ResolvedField>>,
}

impl InputObjectSerializer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declarations: Vec::new(),
            resolved: None,
        }
    }

    /// Declares a field with its wire name and GraphQL type, e.g. `"[ID!]"`.
    ///
    /// The type string is parsed and resolved during initialization.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        self.declarations.push(FieldDeclaration {
            name: name.into(),
            declared_type: declared_type.into(),
        });
        self
    }

    fn fields(&self) -> Result<&[ResolvedField]> {
        self.resolved
            .as_deref()
            .ok_or_else(|| Error::not_initialized(&self.name))
    }
}

impl ValueSerializer for InputObjectSerializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SerializerKind {
        SerializerKind::InputObject
    }

    fn client_kind(&self) -> &'static str {
        "object"
    }

    fn initialize(&mut self, lookup: &SerializerLookup<'_>) -> Result<()> {
        if self.resolved.is_some() {
            return Err(Error::new(
                tgql_core::ErrorCode::AlreadyInitialized,
                format!("`{}` was already initialized", self.name),
            ));
        }

        let resolved = self
            .declarations
            .iter()
            .map(|declaration| {
                let ty = TypeRef::parse(&declaration.declared_type)?;
                let handle = lookup.resolve_type(&ty)?;
                Ok(ResolvedField {
                    name: declaration.name.clone(),
                    ty,
                    handle,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.resolved = Some(resolved);
        Ok(())
    }

    fn serialize(&self, value: &ClientValue, registry: &SerializerRegistry) -> Result<Value> {
        let fields = self.fields()?;

        let object = match value {
            ClientValue::Null => return Ok(Value::Null),
            ClientValue::Object(object) => object,
            other => {
                return Err(Error::serialize(format!(
                    "`{}` expects an object, found {}",
                    self.name,
                    other.kind()
                )))
            }
        };

        if let Some(unknown) = object
            .names()
            .find(|name| !fields.iter().any(|field| field.name == *name))
        {
            return Err(Error::serialize(format!(
                "`{}` has no field `{unknown}`",
                self.name
            )));
        }

        let mut output = Map::new();
        for field in fields {
            let wire = match object.get(&field.name) {
                OptionalValue::Unset => continue,
                OptionalValue::Null => Value::Null,
                OptionalValue::Value(value) => registry
                    .serialize_typed(&field.ty, field.handle, value)
                    .map_err(|mut e| {
                        e.path.insert(0, PathSegment::Field(field.name.clone()));
                        e
                    })?,
            };
            output.insert(field.name.clone(), wire);
        }

        Ok(Value::Object(output))
    }

    fn deserialize(&self, _value: &Value, _registry: &SerializerRegistry) -> Result<ClientValue> {
        Err(Error::unsupported_direction(&self.name))
    }
}
