//! Runtime for tgql clients.
//!
//! This crate provides the machinery generated clients run on:
//! - `serializer`: Value serializers for scalars and enums
//! - `registry`: The serializer registry and its initialization pass
//! - `input_object`: Serializer for input object types
//! - `operation`: Operation definitions, documents and request building
//! - `transport`: The transport interface and raw response shape
//! - `parser`: Result parsers and the parser registry
//! - `pipeline`: The staged execution pipeline

pub mod input_object;
pub mod operation;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod serializer;
pub mod transport;

pub use input_object::InputObjectSerializer;
pub use operation::{
    DocumentRef, DocumentStore, OperationDefinition, OperationKind, RequestBuilder,
    RequestPayload, ResultTypeId, StaticDocuments, Variable,
};
pub use parser::{
    Nested, ObjectField, ObjectReader, ParserRegistry, ParserRegistryBuilder, ResultParser,
    ScalarField,
};
pub use pipeline::{
    BuildRequestStage, ExecutionContext, ExecutionOutcome, ParseResponseStage, Pipeline,
    PipelineBuilder, Stage, TransportStage,
};
pub use registry::{SerializerLookup, SerializerRegistry, SerializerRegistryBuilder};
pub use serializer::{
    BuiltinScalar, CustomScalarSerializer, DeserializeFn, EnumSerializer, Lifecycle,
    ScalarSerializer, SerializeFn, SerializerHandle, SerializerKind, ValueSerializer,
};
pub use transport::{GraphQLError, Location, RawResponse, Transport};
