//! The tgql client.
//!
//! A [`Client`] runs every call through one [`Pipeline`] built from shared,
//! already-initialized registries. Clones share the pipeline.
//!
//! ```ignore
//! let client = Client::builder(parsers, Arc::new(HttpTransport::new(config)?))
//!     .documents(documents)
//!     .build()?;
//!
//! let hero = client
//!     .execute::<HeroQuery>(HeroVariables { episode: OptionalValue::set(Episode::Jedi) }, CancellationToken::new())
//!     .await?
//!     .into_result()?;
//! ```

use crate::typed::{OperationResponse, OperationVariables, TypedOperation};
use std::sync::Arc;
use tgql_core::{Error, ErrorCode, Result};
use tgql_runtime::{
    DocumentStore, ExecutionContext, OperationDefinition, ParserRegistry, Pipeline,
    PipelineBuilder, ResultTypeId, SerializerRegistry, Stage, StaticDocuments, Transport,
};
use tgql_runtime::pipeline::ensure_parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

enum StageEdit {
    InsertBefore(&'static str, Box<dyn Stage>),
    Remove(&'static str),
}

/// Wires registries, transport and documents into a [`Client`].
pub struct ClientBuilder {
    parsers: Arc<ParserRegistry>,
    transport: Arc<dyn Transport>,
    documents: Arc<dyn DocumentStore>,
    edits: Vec<StageEdit>,
}

impl ClientBuilder {
    pub fn new(parsers: Arc<ParserRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            parsers,
            transport,
            documents: Arc::new(StaticDocuments::new()),
            edits: Vec::new(),
        }
    }

    /// Sets the store operation documents are resolved from.
    #[must_use]
    pub fn documents(mut self, documents: impl DocumentStore + 'static) -> Self {
        self.documents = Arc::new(documents);
        self
    }

    /// Adds `stage` in front of the stage called `before`.
    #[must_use]
    pub fn insert_stage_before(mut self, before: &'static str, stage: impl Stage + 'static) -> Self {
        self.edits.push(StageEdit::InsertBefore(before, Box::new(stage)));
        self
    }

    /// Drops the stage called `name`.
    #[must_use]
    pub fn remove_stage(mut self, name: &'static str) -> Self {
        self.edits.push(StageEdit::Remove(name));
        self
    }

    /// Builds the pipeline. Fails if a stage edit names an unknown stage.
    pub fn build(self) -> Result<Client> {
        let serializers = self.parsers.serializers().clone();
        let mut pipeline = PipelineBuilder::standard(
            serializers,
            self.documents,
            self.transport,
            self.parsers.clone(),
        );
        for edit in self.edits {
            pipeline = match edit {
                StageEdit::InsertBefore(before, stage) => pipeline.insert_boxed_before(before, stage)?,
                StageEdit::Remove(name) => pipeline.remove(name)?,
            };
        }
        let pipeline = pipeline.build();
        debug!(stages = ?pipeline.stage_names(), "client built");

        Ok(Client {
            inner: Arc::new(ClientInner {
                pipeline,
                parsers: self.parsers,
            }),
        })
    }
}

struct ClientInner {
    pipeline: Pipeline,
    parsers: Arc<ParserRegistry>,
}

/// The tgql client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pipeline", &self.inner.pipeline)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder(parsers: Arc<ParserRegistry>, transport: Arc<dyn Transport>) -> ClientBuilder {
        ClientBuilder::new(parsers, transport)
    }

    pub fn serializers(&self) -> &Arc<SerializerRegistry> {
        self.inner.parsers.serializers()
    }

    pub fn parsers(&self) -> &Arc<ParserRegistry> {
        &self.inner.parsers
    }

    /// Validates `variables` and executes `Op`.
    ///
    /// An argument error is returned before any stage runs.
    pub async fn execute<Op: TypedOperation>(
        &self,
        variables: Op::Variables,
        cancel: CancellationToken,
    ) -> Result<OperationResponse<Op::Result>> {
        variables.validate()?;
        self.execute_definition::<Op::Result>(Op::definition(variables), cancel)
            .await
    }

    /// Executes a definition built by the caller, without argument validation.
    ///
    /// `R` must be the result type the definition was created for.
    pub async fn execute_definition<R: Send + 'static>(
        &self,
        definition: OperationDefinition,
        cancel: CancellationToken,
    ) -> Result<OperationResponse<R>> {
        let expected = ResultTypeId::of::<R>();
        if definition.result_type() != expected {
            return Err(mismatch(expected, definition.result_type()));
        }
        ensure_parser(&self.inner.parsers, &definition)?;

        let span = info_span!(
            "operation",
            operation = definition.name(),
            kind = ?definition.kind()
        );
        let mut ctx = ExecutionContext::new(definition, cancel);
        self.inner.pipeline.execute(&mut ctx).instrument(span).await;
        let outcome = ctx.finish()?;

        let data = match outcome.result {
            Some(result) => Some(
                *result
                    .downcast::<R>()
                    .map_err(|_| mismatch(expected, expected))?,
            ),
            None => None,
        };

        Ok(OperationResponse {
            data,
            errors: outcome.errors,
            data_error: outcome.data_error,
        })
    }
}

fn mismatch(expected: ResultTypeId, found: ResultTypeId) -> Error {
    Error::new(
        ErrorCode::ResultTypeMismatch,
        format!(
            "Expected a `{}` result, the operation produces `{}`",
            expected.name(),
            found.name()
        ),
    )
}
