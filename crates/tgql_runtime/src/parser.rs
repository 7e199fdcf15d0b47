//! Result parsers and the parser registry.
//!
//! A [`ResultParser`] turns the `data` object of a response into one typed
//! result. Its field handles are resolved once when the parser is built from
//! the [`SerializerRegistry`]; parsing then walks the response through an
//! [`ObjectReader`].

use crate::operation::ResultTypeId;
use crate::registry::{null_value, SerializerRegistry};
use crate::serializer::{wire_kind, SerializerHandle};
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::any::Any;
use std::sync::Arc;
use tgql_core::{ClientValue, Error, ErrorCode, FromClientValue, PathSegment, Result, TypeRef};
use tracing::debug;

/// Parses one result type out of response data.
pub trait ResultParser: Send + Sync + 'static {
    /// The typed result.
    type Output: Send + 'static;

    /// Builds the parser, resolving every serializer and nested parser it needs.
    fn from_registry(registry: &SerializerRegistry) -> Result<Self>
    where
        Self: Sized;

    /// The result type's name, for diagnostics.
    fn result_type(&self) -> &str;

    /// Reads every declared field and builds the result.
    fn parse(&self, reader: &ObjectReader<'_>) -> Result<Self::Output>;
}

/// A scalar or enum field of a result type.
#[derive(Debug, Clone)]
pub struct ScalarField {
    name: String,
    ty: TypeRef,
    handle: SerializerHandle,
}

impl ScalarField {
    /// Resolves `declared_type` (e.g. `"[String!]"`) against the registry.
    pub fn resolve(
        registry: &SerializerRegistry,
        name: impl Into<String>,
        declared_type: &str,
    ) -> Result<Self> {
        let ty = TypeRef::parse(declared_type)?;
        let handle = registry.handle(ty.named_type())?;
        Ok(Self {
            name: name.into(),
            ty,
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }
}

/// An object-typed field parsed by a nested [`ResultParser`].
///
/// The nested parser is built eagerly by [`ObjectField::resolve`], so the
/// parsers of one result must form a finite tree: one parser type per
/// selection set. A parser that holds an `ObjectField` of its own type never
/// finishes building.
#[derive(Debug, Clone)]
pub struct ObjectField<P> {
    name: String,
    ty: TypeRef,
    parser: P,
}

impl<P: ResultParser> ObjectField<P> {
    /// Builds the nested parser and records the field's declared wrappers.
    pub fn resolve(
        registry: &SerializerRegistry,
        name: impl Into<String>,
        declared_type: &str,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            ty: TypeRef::parse(declared_type)?,
            parser: P::from_registry(registry)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn parser(&self) -> &P {
        &self.parser
    }
}

/// An object-typed value with its list and null wrappers.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<O> {
    Null,
    Item(O),
    List(Vec<Nested<O>>),
}

impl<O> Nested<O> {
    /// A single non-null object.
    pub fn required(self) -> Result<O> {
        match self {
            Self::Item(item) => Ok(item),
            Self::Null => Err(Error::new(ErrorCode::NullValue, "expected an object, found null")),
            Self::List(_) => Err(Error::deserialize("expected an object, found a list")),
        }
    }

    /// A single nullable object.
    pub fn optional(self) -> Result<Option<O>> {
        match self {
            Self::Null => Ok(None),
            other => other.required().map(Some),
        }
    }

    /// A non-null list, each element converted with `element`.
    pub fn list<T, F>(self, element: F) -> Result<Vec<T>>
    where
        F: Fn(Nested<O>) -> Result<T>,
    {
        match self {
            Self::List(items) => items.into_iter().map(element).collect(),
            Self::Null => Err(Error::new(ErrorCode::NullValue, "expected a list, found null")),
            Self::Item(_) => Err(Error::deserialize("expected a list, found an object")),
        }
    }

    /// A nullable list, each element converted with `element`.
    pub fn optional_list<T, F>(self, element: F) -> Result<Option<Vec<T>>>
    where
        F: Fn(Nested<O>) -> Result<T>,
    {
        match self {
            Self::Null => Ok(None),
            other => other.list(element).map(Some),
        }
    }
}

/// Read access to one response object while a parser runs.
pub struct ObjectReader<'a> {
    registry: &'a SerializerRegistry,
    type_name: &'a str,
    fields: &'a Map<String, Value>,
    path: Vec<PathSegment>,
}

impl<'a> ObjectReader<'a> {
    /// A reader over the top-level `data` object.
    pub fn new(registry: &'a SerializerRegistry, type_name: &'a str, fields: &'a Map<String, Value>) -> Self {
        Self {
            registry,
            type_name,
            fields,
            path: Vec::new(),
        }
    }

    /// Path of this object inside the response.
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Reads a scalar field.
    ///
    /// An absent field reads as null when the declared type is nullable and
    /// fails with [`ErrorCode::MissingField`] otherwise.
    pub fn scalar<T: FromClientValue>(&self, field: &ScalarField) -> Result<T> {
        let mut path = self.child_path(&field.name);
        let value = match self.fields.get(&field.name) {
            None if field.ty.is_nullable() => ClientValue::Null,
            None => return Err(self.missing(&field.name, path)),
            Some(raw) => self
                .registry
                .deserialize_typed(&field.ty, field.handle, raw, &mut path)?,
        };
        T::from_client_value(value).map_err(|e| e.with_path(path))
    }

    /// Reads an object-typed field through its nested parser.
    pub fn nested<P: ResultParser>(&self, field: &ObjectField<P>) -> Result<Nested<P::Output>> {
        let mut path = self.child_path(&field.name);
        match self.fields.get(&field.name) {
            None if field.ty.is_nullable() => Ok(Nested::Null),
            None => Err(self.missing(&field.name, path)),
            Some(raw) => self.read_nested(&field.ty, raw, &field.parser, &mut path),
        }
    }

    /// Reads a non-null object field.
    pub fn object<P: ResultParser>(&self, field: &ObjectField<P>) -> Result<P::Output> {
        let path = self.child_path(&field.name);
        self.nested(field)?
            .required()
            .map_err(|e| if e.path.is_empty() { e.with_path(path) } else { e })
    }

    /// Reads a nullable object field.
    pub fn optional_object<P: ResultParser>(&self, field: &ObjectField<P>) -> Result<Option<P::Output>> {
        let path = self.child_path(&field.name);
        self.nested(field)?
            .optional()
            .map_err(|e| if e.path.is_empty() { e.with_path(path) } else { e })
    }

    fn read_nested<P: ResultParser>(
        &self,
        ty: &TypeRef,
        raw: &Value,
        parser: &P,
        path: &mut Vec<PathSegment>,
    ) -> Result<Nested<P::Output>> {
        match (ty, raw) {
            (TypeRef::NonNull(_), Value::Null) => Err(null_value(ty, path)),
            (TypeRef::NonNull(inner), raw) => self.read_nested(inner, raw, parser, path),
            (_, Value::Null) => Ok(Nested::Null),
            (TypeRef::List(inner), Value::Array(items)) => {
                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    let value = self.read_nested(inner, item, parser, path);
                    path.pop();
                    values.push(value?);
                }
                Ok(Nested::List(values))
            }
            (TypeRef::Named(_), Value::Object(fields)) => {
                let reader = ObjectReader {
                    registry: self.registry,
                    type_name: ResultParser::result_type(parser),
                    fields,
                    path: path.clone(),
                };
                parser.parse(&reader).map(Nested::Item)
            }
            (_, other) => Err(Error::deserialize(format!(
                "expected {} for `{ty}`, found {}",
                if matches!(ty, TypeRef::List(_)) { "a list" } else { "an object" },
                wire_kind(other)
            ))
            .with_path(path.clone())),
        }
    }

    fn child_path(&self, field: &str) -> Vec<PathSegment> {
        let mut path = self.path.clone();
        path.push(PathSegment::Field(field.to_string()));
        path
    }

    fn missing(&self, field: &str, path: Vec<PathSegment>) -> Error {
        Error::new(
            ErrorCode::MissingField,
            format!(
                "non-nullable field `{}.{field}` is missing from the response",
                self.type_name
            ),
        )
        .with_path(path)
    }
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Object-safe view of a [`ResultParser`].
trait ErasedParser: Send + Sync {
    fn result_type(&self) -> &str;

    fn parse_erased(
        &self,
        registry: &SerializerRegistry,
        data: &Map<String, Value>,
    ) -> Result<Box<dyn Any + Send>>;
}

impl<P: ResultParser> ErasedParser for P {
    fn result_type(&self) -> &str {
        ResultParser::result_type(self)
    }

    fn parse_erased(
        &self,
        registry: &SerializerRegistry,
        data: &Map<String, Value>,
    ) -> Result<Box<dyn Any + Send>> {
        let reader = ObjectReader::new(registry, ResultParser::result_type(self), data);
        let output = self.parse(&reader)?;
        Ok(Box::new(output))
    }
}

/// Collects result parsers over an initialized serializer registry.
pub struct ParserRegistryBuilder {
    serializers: Arc<SerializerRegistry>,
    parsers: FxHashMap<ResultTypeId, Box<dyn ErasedParser>>,
}

impl ParserRegistryBuilder {
    pub fn new(serializers: Arc<SerializerRegistry>) -> Self {
        Self {
            serializers,
            parsers: FxHashMap::default(),
        }
    }

    /// Builds `P` and registers it for `P::Output`.
    pub fn register<P: ResultParser>(mut self) -> Result<Self> {
        let parser = P::from_registry(&self.serializers)?;
        let key = ResultTypeId::of::<P::Output>();
        if self.parsers.contains_key(&key) {
            return Err(Error::new(
                ErrorCode::DuplicateType,
                format!("A parser for `{}` is already registered", key.name()),
            ));
        }
        self.parsers.insert(key, Box::new(parser));
        Ok(self)
    }

    pub fn build(self) -> ParserRegistry {
        debug!(parsers = self.parsers.len(), "parser registry initialized");
        ParserRegistry {
            serializers: self.serializers,
            parsers: self.parsers,
        }
    }
}

/// A frozen set of result parsers keyed by result type.
pub struct ParserRegistry {
    serializers: Arc<SerializerRegistry>,
    parsers: FxHashMap<ResultTypeId, Box<dyn ErasedParser>>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.parsers.values().map(|p| p.result_type()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ParserRegistry {
    pub fn builder(serializers: Arc<SerializerRegistry>) -> ParserRegistryBuilder {
        ParserRegistryBuilder::new(serializers)
    }

    /// The serializer registry the parsers were resolved against.
    pub fn serializers(&self) -> &Arc<SerializerRegistry> {
        &self.serializers
    }

    pub fn contains(&self, result_type: ResultTypeId) -> bool {
        self.parsers.contains_key(&result_type)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Name of the result type registered under `result_type`.
    pub fn result_type_name(&self, result_type: ResultTypeId) -> Result<&str> {
        self.parser(result_type).map(|parser| parser.result_type())
    }

    /// Parses `data` into the result registered under `result_type`.
    pub fn parse_erased(&self, result_type: ResultTypeId, data: &Map<String, Value>) -> Result<Box<dyn Any + Send>> {
        self.parser(result_type)?.parse_erased(&self.serializers, data)
    }

    /// Parses `data` into `R`.
    pub fn parse_typed<R: Send + 'static>(&self, data: &Map<String, Value>) -> Result<R> {
        let result_type = ResultTypeId::of::<R>();
        self.parse_erased(result_type, data)?
            .downcast::<R>()
            .map(|boxed| *boxed)
            .map_err(|_| mismatch(result_type))
    }

    fn parser(&self, result_type: ResultTypeId) -> Result<&dyn ErasedParser> {
        self.parsers
            .get(&result_type)
            .map(|parser| &**parser)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::ParserNotFound,
                    format!("No result parser registered for `{}`", result_type.name()),
                )
            })
    }
}

pub(crate) fn mismatch(result_type: ResultTypeId) -> Error {
    Error::new(
        ErrorCode::ResultTypeMismatch,
        format!("Parsed result is not a `{}`", result_type.name()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    struct Pair {
        a: Option<String>,
        b: Option<String>,
    }

    struct PairParser {
        a: ScalarField,
        b: ScalarField,
    }

    impl ResultParser for PairParser {
        type Output = Pair;

        fn from_registry(registry: &SerializerRegistry) -> Result<Self> {
            Ok(Self {
                a: ScalarField::resolve(registry, "a", "String")?,
                b: ScalarField::resolve(registry, "b", "String")?,
            })
        }

        fn result_type(&self) -> &str {
            "Pair"
        }

        fn parse(&self, reader: &ObjectReader<'_>) -> Result<Pair> {
            Ok(Pair {
                a: reader.scalar(&self.a)?,
                b: reader.scalar(&self.b)?,
            })
        }
    }

    #[derive(Debug, PartialEq)]
    struct Friend {
        name: String,
        appears_in: Vec<Option<String>>,
    }

    struct FriendParser {
        name: ScalarField,
        appears_in: ScalarField,
    }

    impl ResultParser for FriendParser {
        type Output = Friend;

        fn from_registry(registry: &SerializerRegistry) -> Result<Self> {
            Ok(Self {
                name: ScalarField::resolve(registry, "name", "String!")?,
                appears_in: ScalarField::resolve(registry, "appearsIn", "[String]!")?,
            })
        }

        fn result_type(&self) -> &str {
            "Friend"
        }

        fn parse(&self, reader: &ObjectReader<'_>) -> Result<Friend> {
            Ok(Friend {
                name: reader.scalar(&self.name)?,
                appears_in: reader.scalar(&self.appears_in)?,
            })
        }
    }

    #[derive(Debug, PartialEq)]
    struct Hero {
        name: String,
        best_friend: Option<Friend>,
        friends: Option<Vec<Option<Friend>>>,
    }

    struct HeroParser {
        name: ScalarField,
        best_friend: ObjectField<FriendParser>,
        friends: ObjectField<FriendParser>,
    }

    impl ResultParser for HeroParser {
        type Output = Hero;

        fn from_registry(registry: &SerializerRegistry) -> Result<Self> {
            Ok(Self {
                name: ScalarField::resolve(registry, "name", "String!")?,
                best_friend: ObjectField::resolve(registry, "bestFriend", "Character")?,
                friends: ObjectField::resolve(registry, "friends", "[Character]")?,
            })
        }

        fn result_type(&self) -> &str {
            "Hero"
        }

        fn parse(&self, reader: &ObjectReader<'_>) -> Result<Hero> {
            Ok(Hero {
                name: reader.scalar(&self.name)?,
                best_friend: reader.optional_object(&self.best_friend)?,
                friends: reader.nested(&self.friends)?.optional_list(Nested::optional)?,
            })
        }
    }

    fn serializers() -> Arc<SerializerRegistry> {
        Arc::new(
            SerializerRegistry::builder()
                .with_builtin_scalars()
                .build()
                .unwrap(),
        )
    }

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn test_present_and_null_fields() {
        let parsers = ParserRegistry::builder(serializers())
            .register::<PairParser>()
            .unwrap()
            .build();

        let pair: Pair = parsers.parse_typed(&data(json!({"a": "x", "b": null}))).unwrap();
        assert_eq!(pair, Pair { a: Some("x".into()), b: None });
    }

    #[test]
    fn test_absent_nullable_field_is_null() {
        let parsers = ParserRegistry::builder(serializers())
            .register::<PairParser>()
            .unwrap()
            .build();

        let pair: Pair = parsers.parse_typed(&data(json!({"a": "x"}))).unwrap();
        assert_eq!(pair, Pair { a: Some("x".into()), b: None });
    }

    #[test]
    fn test_nested_objects_and_lists() {
        let parsers = ParserRegistry::builder(serializers())
            .register::<HeroParser>()
            .unwrap()
            .build();

        let hero: Hero = parsers
            .parse_typed(&data(json!({
                "name": "R2-D2",
                "bestFriend": {"name": "C-3PO", "appearsIn": ["NEWHOPE", null]},
                "friends": [{"name": "Luke", "appearsIn": []}, null]
            })))
            .unwrap();

        assert_eq!(
            hero,
            Hero {
                name: "R2-D2".into(),
                best_friend: Some(Friend {
                    name: "C-3PO".into(),
                    appears_in: vec![Some("NEWHOPE".into()), None],
                }),
                friends: Some(vec![
                    Some(Friend {
                        name: "Luke".into(),
                        appears_in: vec![],
                    }),
                    None
                ]),
            }
        );
    }

    #[test]
    fn test_missing_required_field_is_data_error() {
        let parsers = ParserRegistry::builder(serializers())
            .register::<HeroParser>()
            .unwrap()
            .build();

        let err = parsers
            .parse_typed::<Hero>(&data(json!({
                "name": "R2-D2",
                "friends": [{"appearsIn": []}]
            })))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
        assert_eq!(err.path_string(), "friends.0.name");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_null_for_non_nullable_field() {
        let parsers = ParserRegistry::builder(serializers())
            .register::<HeroParser>()
            .unwrap()
            .build();

        let err = parsers
            .parse_typed::<Hero>(&data(json!({"name": null})))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NullValue);
        assert_eq!(err.path_string(), "name");
    }

    #[test]
    fn test_wrong_wire_shape() {
        let parsers = ParserRegistry::builder(serializers())
            .register::<HeroParser>()
            .unwrap()
            .build();

        let err = parsers
            .parse_typed::<Hero>(&data(json!({"name": "R2-D2", "bestFriend": "C-3PO"})))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeserializeError);
        assert_eq!(err.path_string(), "bestFriend");
    }

    #[test]
    fn test_unknown_result_type() {
        let parsers = ParserRegistry::builder(serializers()).build();
        assert!(parsers.is_empty());
        let err = parsers.parse_typed::<Pair>(&Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParserNotFound);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_duplicate_parser() {
        let err = ParserRegistry::builder(serializers())
            .register::<PairParser>()
            .unwrap()
            .register::<PairParser>()
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::DuplicateType);
    }

    #[test]
    fn test_parser_needs_registered_serializers() {
        let empty = Arc::new(SerializerRegistry::builder().build().unwrap());
        let err = ParserRegistry::builder(empty)
            .register::<PairParser>()
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::TypeNotFound);
    }

    #[test]
    fn test_result_type_name() {
        let parsers = ParserRegistry::builder(serializers())
            .register::<HeroParser>()
            .unwrap()
            .build();
        assert_eq!(parsers.result_type_name(ResultTypeId::of::<Hero>()).unwrap(), "Hero");
    }
}
