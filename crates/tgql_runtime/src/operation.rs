//! Operation definitions and request building.

use crate::registry::SerializerRegistry;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Map;
use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tgql_core::{
    ClientValue, Error, ErrorCode, IntoClientValue, OptionalValue, PathSegment, Result, TypeRef,
};
use tracing::trace;

/// The kind of GraphQL operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

/// Opaque handle to an operation document held by a [`DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef(Cow<'static, str>);

impl DocumentRef {
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves document references to query text.
pub trait DocumentStore: Send + Sync {
    fn resolve(&self, document: &DocumentRef) -> Result<Arc<str>>;
}

/// An in-memory [`DocumentStore`].
#[derive(Debug, Clone, Default)]
pub struct StaticDocuments {
    documents: FxHashMap<DocumentRef, Arc<str>>,
}

impl StaticDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document under `id`.
    #[must_use]
    pub fn document(mut self, id: impl Into<Cow<'static, str>>, text: impl Into<Arc<str>>) -> Self {
        self.insert(id, text);
        self
    }

    pub fn insert(&mut self, id: impl Into<Cow<'static, str>>, text: impl Into<Arc<str>>) {
        self.documents.insert(DocumentRef::new(id), text.into());
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for StaticDocuments {
    fn resolve(&self, document: &DocumentRef) -> Result<Arc<str>> {
        self.documents.get(document).cloned().ok_or_else(|| {
            Error::new(
                ErrorCode::DocumentNotFound,
                format!("No document registered for `{document}`"),
            )
        })
    }
}

/// Identity of an operation's typed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultTypeId {
    id: TypeId,
    name: &'static str,
}

impl ResultTypeId {
    pub fn of<R: 'static>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: std::any::type_name::<R>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// The Rust type name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// One declared variable of an operation together with its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    declared_type: String,
    value: OptionalValue<ClientValue>,
}

impl Variable {
    /// Declares `name` with a GraphQL type string such as `"ReviewInput!"`.
    pub fn new<T: IntoClientValue>(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        value: OptionalValue<T>,
    ) -> Self {
        let value = match value.map(IntoClientValue::into_client_value) {
            OptionalValue::Value(ClientValue::Null) => OptionalValue::Null,
            other => other,
        };
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            value,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    pub fn value(&self) -> &OptionalValue<ClientValue> {
        &self.value
    }
}

/// Everything needed to execute one operation call.
#[derive(Debug, Clone)]
pub struct OperationDefinition {
    name: String,
    document: DocumentRef,
    kind: OperationKind,
    result_type: ResultTypeId,
    variables: Vec<Variable>,
}

impl OperationDefinition {
    /// Creates a definition whose result parses into `R`.
    pub fn new<R: 'static>(
        name: impl Into<String>,
        document: DocumentRef,
        variables: Vec<Variable>,
    ) -> Self {
        Self {
            name: name.into(),
            document,
            kind: OperationKind::default(),
            result_type: ResultTypeId::of::<R>(),
            variables,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: OperationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn result_type(&self) -> ResultTypeId {
        self.result_type
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

/// The transport-ready request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub operation_name: String,
    pub document: String,
    pub variables: Map<String, serde_json::Value>,
}

/// Turns an [`OperationDefinition`] into a [`RequestPayload`].
#[derive(Debug, Clone, Copy)]
pub struct RequestBuilder<'a> {
    registry: &'a SerializerRegistry,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(registry: &'a SerializerRegistry) -> Self {
        Self { registry }
    }

    /// Serializes every set variable through its declared type.
    ///
    /// Unset variables are left out of the payload; `Null` variables are sent
    /// as `null`.
    pub fn build(&self, operation: &OperationDefinition, document: &str) -> Result<RequestPayload> {
        let mut variables = Map::new();

        for variable in operation.variables() {
            let value = match variable.value() {
                OptionalValue::Unset => continue,
                OptionalValue::Null => serde_json::Value::Null,
                OptionalValue::Value(value) => self.serialize_variable(variable, value)?,
            };
            variables.insert(variable.name().to_string(), value);
        }

        trace!(
            operation = operation.name(),
            variables = variables.len(),
            "request built"
        );

        Ok(RequestPayload {
            operation_name: operation.name().to_string(),
            document: document.to_string(),
            variables,
        })
    }

    fn serialize_variable(&self, variable: &Variable, value: &ClientValue) -> Result<serde_json::Value> {
        let ty = TypeRef::parse(variable.declared_type())?;
        let handle = self.registry.handle(ty.named_type())?;
        self.registry
            .serialize_typed(&ty, handle, value)
            .map_err(|mut e| {
                e.path.insert(0, PathSegment::Field(variable.name().to_string()));
                e.message = format!("Variable `${}`: {}", variable.name(), e.message);
                e
            })
    }
}
