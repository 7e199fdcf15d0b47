//! The execution pipeline.
//!
//! A call runs as a fixed chain of [`Stage`]s over one [`ExecutionContext`]:
//! `build_request`, `transport`, `parse_response`. The chain is composed on a
//! [`PipelineBuilder`] and cannot change once built.

use crate::operation::{DocumentStore, OperationDefinition, RequestBuilder, RequestPayload};
use crate::parser::ParserRegistry;
use crate::registry::SerializerRegistry;
use crate::transport::{GraphQLError, RawResponse, Transport};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use tgql_core::{Error, ErrorCode, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

/// Name of the stage that builds the request payload.
pub const BUILD_REQUEST: &str = "build_request";
/// Name of the stage that sends the payload.
pub const TRANSPORT: &str = "transport";
/// Name of the stage that parses the response.
pub const PARSE_RESPONSE: &str = "parse_response";

/// State shared by the stages of one call.
pub struct ExecutionContext {
    pub operation: OperationDefinition,
    pub cancel: CancellationToken,
    pub request: Option<RequestPayload>,
    pub response: Option<RawResponse>,
    /// The typed result, erased until the facade downcasts it.
    pub result: Option<Box<dyn Any + Send>>,
    /// Application errors reported by the server.
    pub errors: Vec<GraphQLError>,
    /// Failure to parse `data` into the typed result.
    pub data_error: Option<Error>,
    failure: Option<Error>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("operation", &self.operation.name())
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .field("result", &self.result.is_some())
            .field("errors", &self.errors.len())
            .field("data_error", &self.data_error)
            .field("failure", &self.failure)
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(operation: OperationDefinition, cancel: CancellationToken) -> Self {
        Self {
            operation,
            cancel,
            request: None,
            response: None,
            result: None,
            errors: Vec::new(),
            data_error: None,
            failure: None,
        }
    }

    /// The error that stopped the pipeline, if any.
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    /// Consumes the context, returning the outcome or the terminal failure.
    pub fn finish(self) -> Result<ExecutionOutcome> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }
        Ok(ExecutionOutcome {
            result: self.result,
            errors: self.errors,
            data_error: self.data_error,
        })
    }
}

/// What a completed pipeline produced.
pub struct ExecutionOutcome {
    pub result: Option<Box<dyn Any + Send>>,
    pub errors: Vec<GraphQLError>,
    pub data_error: Option<Error>,
}

impl std::fmt::Debug for ExecutionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOutcome")
            .field("result", &self.result.is_some())
            .field("errors", &self.errors)
            .field("data_error", &self.data_error)
            .finish()
    }
}

/// One step of the pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs the stage. An error stops the pipeline.
    async fn run(&self, ctx: &mut ExecutionContext) -> Result<()>;
}

/// Resolves the document and serializes the variables.
///
/// Fails with [`ErrorCode::ParserNotFound`] before anything is sent when no
/// parser is registered for the operation's result type.
pub struct BuildRequestStage {
    serializers: Arc<SerializerRegistry>,
    documents: Arc<dyn DocumentStore>,
    parsers: Arc<ParserRegistry>,
}

impl BuildRequestStage {
    pub fn new(
        serializers: Arc<SerializerRegistry>,
        documents: Arc<dyn DocumentStore>,
        parsers: Arc<ParserRegistry>,
    ) -> Self {
        Self {
            serializers,
            documents,
            parsers,
        }
    }
}

#[async_trait]
impl Stage for BuildRequestStage {
    fn name(&self) -> &'static str {
        BUILD_REQUEST
    }

    async fn run(&self, ctx: &mut ExecutionContext) -> Result<()> {
        ensure_parser(&self.parsers, &ctx.operation)?;
        let document = self.documents.resolve(ctx.operation.document())?;
        let request = RequestBuilder::new(&self.serializers).build(&ctx.operation, &document)?;
        ctx.request = Some(request);
        Ok(())
    }
}

/// Sends the request through the configured [`Transport`].
pub struct TransportStage {
    transport: Arc<dyn Transport>,
}

impl TransportStage {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Stage for TransportStage {
    fn name(&self) -> &'static str {
        TRANSPORT
    }

    async fn run(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let request = ctx.request.as_ref().ok_or_else(|| {
            Error::new(
                ErrorCode::NotInitialized,
                "transport stage ran before a request was built",
            )
        })?;

        let response = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(Error::cancelled()),
            response = self.transport.send(request, &ctx.cancel) => response?,
        };

        debug!(
            data = response.data.is_some(),
            errors = response.errors.len(),
            "response received"
        );
        ctx.response = Some(response);
        Ok(())
    }
}

/// Parses `data` with the parser registered for the operation's result type.
pub struct ParseResponseStage {
    parsers: Arc<ParserRegistry>,
}

impl ParseResponseStage {
    pub fn new(parsers: Arc<ParserRegistry>) -> Self {
        Self { parsers }
    }
}

#[async_trait]
impl Stage for ParseResponseStage {
    fn name(&self) -> &'static str {
        PARSE_RESPONSE
    }

    async fn run(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let response = ctx.response.take().ok_or_else(|| {
            Error::new(
                ErrorCode::NotInitialized,
                "parse stage ran before a response was received",
            )
        })?;

        if !response.is_well_formed() {
            return Err(Error::new(
                ErrorCode::InvalidResponse,
                "response carries neither `data` nor `errors`",
            ));
        }

        ensure_parser(&self.parsers, &ctx.operation)?;
        let result_type = ctx.operation.result_type();

        ctx.errors = response.errors;
        match response.data {
            None | Some(serde_json::Value::Null) => {}
            Some(serde_json::Value::Object(data)) => {
                match self.parsers.parse_erased(result_type, &data) {
                    Ok(result) => ctx.result = Some(result),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        debug!(error = %e, "response data did not parse");
                        ctx.data_error = Some(e);
                    }
                }
            }
            Some(other) => {
                ctx.data_error = Some(Error::deserialize(format!(
                    "`data` must be an object, found {}",
                    crate::serializer::wire_kind(&other)
                )));
            }
        }
        Ok(())
    }
}

/// Fails unless `parsers` can produce the operation's result.
pub fn ensure_parser(parsers: &ParserRegistry, operation: &OperationDefinition) -> Result<()> {
    let result_type = operation.result_type();
    if parsers.contains(result_type) {
        return Ok(());
    }
    Err(Error::new(
        ErrorCode::ParserNotFound,
        format!("No result parser registered for `{}`", result_type.name()),
    ))
}

/// A fixed, ordered chain of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs every stage in order, checking for cancellation before each.
    ///
    /// The first error is recorded as the context's failure and no further
    /// stage runs.
    pub async fn execute(&self, ctx: &mut ExecutionContext) {
        for stage in &self.stages {
            if ctx.failure.is_some() {
                return;
            }
            if ctx.cancel.is_cancelled() {
                debug!(stage = stage.name(), "cancelled before stage");
                ctx.failure = Some(Error::cancelled());
                return;
            }

            let span = debug_span!("stage", name = stage.name());
            if let Err(e) = stage.run(ctx).instrument(span).await {
                debug!(stage = stage.name(), error = %e, "stage failed");
                ctx.failure = Some(e);
            }
        }
    }
}

/// Composes a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `build_request`, `transport`, `parse_response` chain.
    pub fn standard(
        serializers: Arc<SerializerRegistry>,
        documents: Arc<dyn DocumentStore>,
        transport: Arc<dyn Transport>,
        parsers: Arc<ParserRegistry>,
    ) -> Self {
        Self::new()
            .stage(BuildRequestStage::new(serializers, documents, parsers.clone()))
            .stage(TransportStage::new(transport))
            .stage(ParseResponseStage::new(parsers))
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Inserts `stage` before the stage called `before`.
    pub fn insert_before<S: Stage + 'static>(self, before: &str, stage: S) -> Result<Self> {
        self.insert_boxed_before(before, Box::new(stage))
    }

    /// Inserts an already boxed stage before the stage called `before`.
    pub fn insert_boxed_before(mut self, before: &str, stage: Box<dyn Stage>) -> Result<Self> {
        let position = self.position(before)?;
        self.stages.insert(position, stage);
        Ok(self)
    }

    /// Removes the stage called `name`.
    pub fn remove(mut self, name: &str) -> Result<Self> {
        let position = self.position(name)?;
        self.stages.remove(position);
        Ok(self)
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.stages
            .iter()
            .position(|stage| stage.name() == name)
            .ok_or_else(|| {
                Error::new(ErrorCode::StageNotFound, format!("No stage named `{name}`"))
            })
    }
}
