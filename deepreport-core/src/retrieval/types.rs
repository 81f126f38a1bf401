//! Evidence, resources and web results.

use serde::{Deserialize, Serialize};

/// Text used when a web search came back empty.
pub const NO_WEB_RESULTS: &str = "No search results found.";

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceOrigin {
    /// Knowledge-base retrieval
    Rag,
    /// Web search
    Web,
}

impl std::fmt::Display for EvidenceOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rag => write!(f, "rag"),
            Self::Web => write!(f, "web"),
        }
    }
}

/// A citable source behind a piece of evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// One unit of retrieved evidence. Empty content is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub origin: EvidenceOrigin,
    pub content: String,
    /// Relevance in `[0, 1]`; higher is better
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl Evidence {
    pub fn rag(content: impl Into<String>, score: f64) -> Self {
        Self {
            origin: EvidenceOrigin::Rag,
            content: content.into(),
            score,
            source: None,
        }
    }

    pub fn web(content: impl Into<String>, score: f64) -> Self {
        Self {
            origin: EvidenceOrigin::Web,
            content: content.into(),
            score,
            source: None,
        }
    }

    pub fn with_source(mut self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.source = Some(Source {
            title: title.into(),
            url: url.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A knowledge-base resource the user asked to search within.
///
/// URIs look like `rag://dataset/<dataset_id>` with an optional
/// `#<document_id>` fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Resource {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
            description: String::new(),
        }
    }

    /// Split the URI into dataset id and optional document id.
    pub fn dataset_and_document(&self) -> Option<(String, Option<String>)> {
        let rest = self.uri.strip_prefix("rag://")?;
        let (path, fragment) = match rest.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (rest, None),
        };
        let dataset = path.strip_prefix("dataset/")?.trim_matches('/');
        if dataset.is_empty() {
            return None;
        }
        let document = fragment
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        Some((dataset.to_string(), document))
    }
}

/// A single web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl WebResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    /// Convert to evidence with a rank-based score: the first hit scores
    /// 1.0 and each later hit a little less.
    pub fn into_evidence(self, rank: usize) -> Evidence {
        let score = 1.0 / (1.0 + rank as f64 * 0.25);
        let content = format!("{}\n{}\nURL: {}", self.title, self.snippet, self.url);
        Evidence::web(content, score).with_source(self.title, self.url)
    }
}

/// Render web results as a numbered text block.
pub fn format_web_results(results: &[WebResult]) -> String {
    if results.is_empty() {
        return NO_WEB_RESULTS.to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let title = if r.title.is_empty() { "No title" } else { &r.title };
            let snippet = if r.snippet.is_empty() {
                "No snippet available"
            } else {
                &r.snippet
            };
            let url = if r.url.is_empty() { "No URL" } else { &r.url };
            format!("{}. {}\n   {}\n   URL: {}", i + 1, title, snippet, url)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
