//! Collaborators and request scope shared by both pipelines.
//!
//! [`Toolkit`] bundles the generator, retrievers, progress sink and
//! configuration. Its call helpers run every external call through
//! [`bounded_call`] so a pipeline step only ever sees a [`CallOutcome`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::config::ResearchConfig;
use crate::events::{NullSink, ProgressEvent, ProgressKind, ProgressSink};
use crate::generator::{GenerationRequest, Generator};
use crate::guard::{bounded_call, CallOutcome};
use crate::retrieval::{Evidence, RagRetriever, Resource, WebResult, WebRetriever};

/// Identity and cancellation for one request.
#[derive(Debug, Clone)]
pub struct RequestScope {
    pub id: Uuid,
    pub cancel: CancellationToken,
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestScope {
    pub fn new() -> Self {
        Self::with_cancel(CancellationToken::new())
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// External collaborators plus configuration.
#[derive(Clone)]
pub struct Toolkit {
    pub generator: Arc<dyn Generator>,
    pub web: Arc<dyn WebRetriever>,
    pub rag: Option<Arc<dyn RagRetriever>>,
    pub sink: Arc<dyn ProgressSink>,
    pub config: Arc<ResearchConfig>,
}

impl Toolkit {
    pub fn new(
        generator: Arc<dyn Generator>,
        web: Arc<dyn WebRetriever>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            generator,
            web,
            rag: None,
            sink: Arc::new(NullSink),
            config: Arc::new(config),
        }
    }

    pub fn with_rag(mut self, rag: Arc<dyn RagRetriever>) -> Self {
        self.rag = Some(rag);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Whether knowledge-base retrieval applies to a request with these
    /// resources.
    pub fn rag_applies(&self, resources: &[Resource]) -> bool {
        self.config.rag.enabled
            && self.rag.is_some()
            && (!resources.is_empty() || self.config.rag.general_use)
    }

    pub(crate) async fn generate(
        &self,
        request: GenerationRequest,
        scope: &RequestScope,
    ) -> CallOutcome<String> {
        let label = request.purpose.to_string();
        bounded_call(
            &label,
            self.config.generation_timeout(),
            &scope.cancel,
            self.generator.invoke(request),
        )
        .await
    }

    pub(crate) async fn search_web(
        &self,
        query: &str,
        max_results: usize,
        scope: &RequestScope,
    ) -> CallOutcome<Vec<WebResult>> {
        bounded_call(
            self.web.name(),
            self.config.retrieval_timeout(),
            &scope.cancel,
            self.web.search(query, max_results),
        )
        .await
    }

    pub(crate) async fn query_rag(
        &self,
        query: &str,
        resources: &[Resource],
        scope: &RequestScope,
    ) -> CallOutcome<Vec<Evidence>> {
        let Some(rag) = &self.rag else {
            debug!("No knowledge base configured");
            return CallOutcome::Completed(Vec::new());
        };
        let outcome = bounded_call(
            "rag",
            self.config.retrieval_timeout(),
            &scope.cancel,
            rag.query(query, resources),
        )
        .await;
        match outcome {
            CallOutcome::Completed(mut evidence) => {
                evidence.retain(|e| !e.is_empty());
                evidence.truncate(self.config.rag.max_documents.max(1));
                CallOutcome::Completed(evidence)
            }
            other => other,
        }
    }

    pub(crate) fn emit(&self, scope: &RequestScope, kind: ProgressKind) {
        self.sink.emit(ProgressEvent::new(scope.id, kind));
    }
}
