//! Evidence retrieval: knowledge base (RAG) and web search.
//!
//! The pipelines only see the two traits below. Concrete adapters for
//! RAGFlow, Tavily, Serper and Google Custom Search live in the submodules
//! and are picked from the environment.

mod ragflow;
mod types;
mod web;

use async_trait::async_trait;

use crate::error::Result;

pub use ragflow::{RagFlowConfig, RagFlowRetriever};
pub use types::{
    format_web_results, Evidence, EvidenceOrigin, Resource, Source, WebResult, NO_WEB_RESULTS,
};
pub use web::{
    web_retriever_from_env, GoogleSearch, SearchEngine, SerperSearch, TavilySearch,
};

/// Knowledge-base retrieval.
#[async_trait]
pub trait RagRetriever: Send + Sync {
    /// Evidence relevant to `query`, restricted to `resources` when given.
    async fn query(&self, query: &str, resources: &[Resource]) -> Result<Vec<Evidence>>;

    /// Resources available for searching, optionally filtered by name.
    async fn list_resources(&self, _filter: Option<&str>) -> Result<Vec<Resource>> {
        Ok(Vec::new())
    }
}

/// Web search.
#[async_trait]
pub trait WebRetriever: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}
