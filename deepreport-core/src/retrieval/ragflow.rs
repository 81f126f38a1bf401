//! RAGFlow knowledge-base adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::llm::build_http_client;

use super::types::{Evidence, Resource};
use super::RagRetriever;

/// Chunks kept per document when none pass the similarity threshold.
const BEST_EFFORT_CHUNKS: usize = 3;

/// Connection and filtering settings for RAGFlow.
#[derive(Debug, Clone)]
pub struct RagFlowConfig {
    pub api_url: String,
    pub api_key: String,
    /// Chunks requested per call
    pub page_size: usize,
    /// Documents kept per query
    pub max_documents: usize,
    /// Minimum chunk similarity
    pub similarity_threshold: f64,
    pub timeout_secs: u64,
}

impl RagFlowConfig {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut api_url: String = api_url.into();
        // A bare localhost URL is almost always missing the API port
        if api_url.trim_end_matches('/') == "http://localhost" {
            api_url = "http://localhost:9380".to_string();
        }
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            page_size: 10,
            max_documents: 5,
            similarity_threshold: 0.1,
            timeout_secs: 45,
        }
    }

    pub fn with_limits(mut self, max_documents: usize, similarity_threshold: f64) -> Self {
        self.max_documents = max_documents;
        self.similarity_threshold = similarity_threshold;
        self
    }

    /// Read `RAGFLOW_API_URL`, `RAGFLOW_API_KEY` and `RAGFLOW_RETRIEVAL_SIZE`.
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("RAGFLOW_API_URL")
            .map_err(|_| Error::config("RAGFLOW_API_URL is not set"))?;
        let api_key = std::env::var("RAGFLOW_API_KEY")
            .map_err(|_| Error::config("RAGFLOW_API_KEY is not set"))?;
        let mut config = Self::new(api_url, api_key);
        if let Some(size) = std::env::var("RAGFLOW_RETRIEVAL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.page_size = size;
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct RetrievalRequest<'a> {
    question: &'a str,
    dataset_ids: Vec<String>,
    document_ids: Vec<String>,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
struct RetrievalResponse {
    #[serde(default)]
    data: Option<RetrievalData>,
}

#[derive(Debug, Default, Deserialize)]
struct RetrievalData {
    #[serde(default)]
    doc_aggs: Vec<DocAgg>,
    #[serde(default)]
    chunks: Vec<RawChunk>,
}

#[derive(Debug, Deserialize)]
struct DocAgg {
    doc_id: String,
    #[serde(default)]
    doc_name: String,
}

#[derive(Debug, Deserialize)]
struct RawChunk {
    document_id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct DatasetList {
    #[serde(default)]
    data: Vec<Dataset>,
}

#[derive(Debug, Deserialize)]
struct Dataset {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// Knowledge-base retriever backed by RAGFlow's retrieval API.
pub struct RagFlowRetriever {
    config: RagFlowConfig,
    http: Client,
}

impl RagFlowRetriever {
    pub fn new(config: RagFlowConfig) -> Result<Self> {
        let http = build_http_client(config.timeout_secs)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(RagFlowConfig::from_env()?)
    }
}

/// Group chunks by document, keep those above the threshold (or the first
/// few when none qualify), and emit one piece of evidence per document.
fn documents_to_evidence(
    data: RetrievalData,
    max_documents: usize,
    similarity_threshold: f64,
) -> Vec<Evidence> {
    let mut order: Vec<String> = Vec::new();
    let mut titles: HashMap<String, String> = HashMap::new();
    for agg in data.doc_aggs {
        if !titles.contains_key(&agg.doc_id) {
            order.push(agg.doc_id.clone());
        }
        titles.insert(agg.doc_id, agg.doc_name);
    }

    let mut chunks: HashMap<String, Vec<RawChunk>> = HashMap::new();
    for chunk in data.chunks {
        if titles.contains_key(&chunk.document_id) {
            chunks.entry(chunk.document_id.clone()).or_default().push(chunk);
        } else {
            debug!(document_id = %chunk.document_id, "Chunk references unknown document");
        }
    }

    order
        .into_iter()
        .take(max_documents)
        .filter_map(|doc_id| {
            let doc_chunks = chunks.remove(&doc_id).unwrap_or_default();
            if doc_chunks.is_empty() {
                return None;
            }
            let relevant: Vec<&RawChunk> = doc_chunks
                .iter()
                .filter(|c| c.similarity >= similarity_threshold)
                .collect();
            let kept: Vec<&RawChunk> = if relevant.is_empty() {
                warn!(
                    document_id = %doc_id,
                    threshold = similarity_threshold,
                    "No chunks above similarity threshold, keeping best effort"
                );
                doc_chunks.iter().take(BEST_EFFORT_CHUNKS).collect()
            } else {
                relevant
            };

            let score = kept.iter().map(|c| c.similarity).fold(0.0_f64, f64::max);
            let content = kept
                .iter()
                .map(|c| c.content.trim())
                .collect::<Vec<_>>()
                .join("\n\n");
            let title = titles.remove(&doc_id).unwrap_or_default();
            let url = format!("knowledge-base://{}", title);
            Some(Evidence::rag(content, score.clamp(0.0, 1.0)).with_source(title, url))
        })
        .collect()
}

#[async_trait]
impl RagRetriever for RagFlowRetriever {
    async fn query(&self, query: &str, resources: &[Resource]) -> Result<Vec<Evidence>> {
        let mut dataset_ids = Vec::new();
        let mut document_ids = Vec::new();
        for resource in resources {
            match resource.dataset_and_document() {
                Some((dataset, document)) => {
                    dataset_ids.push(dataset);
                    document_ids.extend(document);
                }
                None => warn!(uri = %resource.uri, "Skipping resource with invalid URI"),
            }
        }

        let request = RetrievalRequest {
            question: query,
            dataset_ids,
            document_ids,
            page_size: self.config.page_size,
        };

        let url = format!("{}/api/v1/retrieval", self.config.api_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::retrieval("ragflow", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::retrieval("ragflow", format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(Error::retrieval("ragflow", format!("{}: {}", status, body)));
        }

        let parsed: RetrievalResponse = serde_json::from_str(&body)?;
        let evidence = documents_to_evidence(
            parsed.data.unwrap_or_default(),
            self.config.max_documents,
            self.config.similarity_threshold,
        );
        info!(documents = evidence.len(), "Knowledge base query completed");
        Ok(evidence)
    }

    async fn list_resources(&self, filter: Option<&str>) -> Result<Vec<Resource>> {
        let url = format!("{}/api/v1/datasets", self.config.api_url);
        let mut request = self.http.get(&url).bearer_auth(&self.config.api_key);
        if let Some(name) = filter {
            request = request.query(&[("name", name)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::retrieval("ragflow", format!("HTTP request failed: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::retrieval("ragflow", format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            return Err(Error::retrieval("ragflow", format!("{}: {}", status, body)));
        }

        let datasets: DatasetList = serde_json::from_str(&body)?;
        Ok(datasets
            .data
            .into_iter()
            .map(|d| Resource {
                uri: format!("rag://dataset/{}", d.id),
                title: d.name,
                description: d.description.unwrap_or_default(),
            })
            .collect())
    }
}
