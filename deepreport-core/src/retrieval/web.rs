//! Web search adapters: Tavily, Serper and Google Custom Search.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::llm::build_http_client;

use super::types::WebResult;
use super::WebRetriever;

const SEARCH_TIMEOUT_SECS: u64 = 30;

/// Supported web search engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchEngine {
    Tavily,
    Serper,
    Google,
}

impl std::str::FromStr for SearchEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tavily" => Ok(Self::Tavily),
            "serper" => Ok(Self::Serper),
            "google" => Ok(Self::Google),
            other => Err(Error::config(format!("unknown search engine: {}", other))),
        }
    }
}

/// Build the web retriever named by `SEARCH_ENGINE` (default `tavily`).
pub fn web_retriever_from_env() -> Result<Arc<dyn WebRetriever>> {
    let engine: SearchEngine = std::env::var("SEARCH_ENGINE")
        .unwrap_or_else(|_| "tavily".to_string())
        .parse()?;
    let require = |key: &str| {
        std::env::var(key)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::config(format!("{} is not set", key)))
    };

    let retriever: Arc<dyn WebRetriever> = match engine {
        SearchEngine::Tavily => Arc::new(TavilySearch::new(require("TAVILY_API_KEY")?)?),
        SearchEngine::Serper => Arc::new(SerperSearch::new(require("SERPER_API_KEY")?)?),
        SearchEngine::Google => Arc::new(GoogleSearch::new(
            require("GOOGLE_API_KEY")?,
            require("GOOGLE_CSE_ID")?,
        )?),
    };
    Ok(retriever)
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::retrieval(provider, format!("Failed to read response: {}", e)))?;
    if !status.is_success() {
        return Err(Error::retrieval(provider, format!("{}: {}", status, body)));
    }
    serde_json::from_str(&body)
        .map_err(|e| Error::retrieval(provider, format!("Failed to parse response: {}", e)))
}

/// Tavily search API.
pub struct TavilySearch {
    api_key: String,
    http: Client,
}

impl TavilySearch {
    const URL: &'static str = "https://api.tavily.com/search";

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            http: build_http_client(SEARCH_TIMEOUT_SECS)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
}

impl From<TavilyResponse> for Vec<WebResult> {
    fn from(response: TavilyResponse) -> Self {
        response
            .results
            .into_iter()
            .map(|r| WebResult::new(r.title, r.url, r.content))
            .collect()
    }
}

#[async_trait]
impl WebRetriever for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "advanced",
        });
        let response = self
            .http
            .post(Self::URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::retrieval("tavily", format!("HTTP request failed: {}", e)))?;
        let parsed: TavilyResponse = read_json("tavily", response).await?;
        let mut results: Vec<WebResult> = parsed.into();
        results.truncate(max_results);
        Ok(results)
    }

    fn name(&self) -> &str {
        "tavily"
    }
}

/// Serper (Google results) API.
pub struct SerperSearch {
    api_key: String,
    http: Client,
}

impl SerperSearch {
    const URL: &'static str = "https://google.serper.dev/search";

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            http: build_http_client(SEARCH_TIMEOUT_SECS)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<LinkResult>,
}

/// Result shape shared by Serper and Google Custom Search.
#[derive(Debug, Deserialize)]
struct LinkResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl From<LinkResult> for WebResult {
    fn from(r: LinkResult) -> Self {
        WebResult::new(r.title, r.link, r.snippet)
    }
}

#[async_trait]
impl WebRetriever for SerperSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>> {
        let response = self
            .http
            .post(Self::URL)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": max_results }))
            .send()
            .await
            .map_err(|e| Error::retrieval("serper", format!("HTTP request failed: {}", e)))?;
        let parsed: SerperResponse = read_json("serper", response).await?;
        Ok(parsed
            .organic
            .into_iter()
            .take(max_results)
            .map(WebResult::from)
            .collect())
    }

    fn name(&self) -> &str {
        "serper"
    }
}

/// Google Custom Search JSON API.
pub struct GoogleSearch {
    api_key: String,
    cse_id: String,
    http: Client,
}

impl GoogleSearch {
    const URL: &'static str = "https://www.googleapis.com/customsearch/v1";
    /// The API rejects `num` above ten.
    const MAX_NUM: usize = 10;

    pub fn new(api_key: impl Into<String>, cse_id: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            cse_id: cse_id.into(),
            http: build_http_client(SEARCH_TIMEOUT_SECS)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<LinkResult>,
}

#[async_trait]
impl WebRetriever for GoogleSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebResult>> {
        let num = max_results.clamp(1, Self::MAX_NUM).to_string();
        let response = self
            .http
            .get(Self::URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::retrieval("google", format!("HTTP request failed: {}", e)))?;
        let parsed: GoogleResponse = read_json("google", response).await?;
        Ok(parsed
            .items
            .into_iter()
            .take(max_results)
            .map(WebResult::from)
            .collect())
    }

    fn name(&self) -> &str {
        "google"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_engine_parse() {
        assert_eq!("Tavily".parse::<SearchEngine>().unwrap(), SearchEngine::Tavily);
        assert_eq!(" serper ".parse::<SearchEngine>().unwrap(), SearchEngine::Serper);
        assert!("bing".parse::<SearchEngine>().is_err());
    }

    #[test]
    fn test_tavily_mapping() {
        let parsed: TavilyResponse = serde_json::from_str(
            r#"{"results": [{"title": "T", "content": "body", "url": "https://t"}]}"#,
        )
        .unwrap();
        let results: Vec<WebResult> = parsed.into();
        assert_eq!(results, vec![WebResult::new("T", "https://t", "body")]);
    }

    #[test]
    fn test_serper_mapping() {
        let parsed: SerperResponse = serde_json::from_str(
            r#"{"organic": [{"title": "S", "snippet": "snip", "link": "https://s", "position": 1}]}"#,
        )
        .unwrap();
        let results: Vec<WebResult> = parsed.organic.into_iter().map(WebResult::from).collect();
        assert_eq!(results, vec![WebResult::new("S", "https://s", "snip")]);
    }

    #[test]
    fn test_missing_results_field() {
        let parsed: GoogleResponse = serde_json::from_str(r#"{"kind": "customsearch"}"#).unwrap();
        assert!(parsed.items.is_empty());
    }
}
