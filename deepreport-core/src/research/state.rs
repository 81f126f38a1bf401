//! State carried through the standard-mode research loop.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::ResearchConfig;
use crate::governor::IterationGovernor;
use crate::parse::ReflectionVerdict;
use crate::queries::QueryLedger;
use crate::retrieval::{Evidence, EvidenceOrigin, Resource, Source};

/// Text used when no evidence was gathered.
pub const NO_RESEARCH_CONTENT: &str = "No research content available.";

/// Loop state. Each step consumes it and returns the updated value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchState {
    pub topic: String,
    pub resources: Vec<Resource>,
    /// Queries waiting to be retrieved
    pub pending: VecDeque<String>,
    /// Every query issued so far
    pub ledger: QueryLedger,
    pub evidence: Vec<Evidence>,
    pub governor: IterationGovernor,
    pub last_verdict: Option<ReflectionVerdict>,
    /// Whether the knowledge base has been consulted for the topic
    pub rag_consulted: bool,
    pub cancelled: bool,
}

impl ResearchState {
    pub fn new(topic: impl Into<String>, resources: Vec<Resource>, config: &ResearchConfig) -> Self {
        Self {
            topic: topic.into(),
            resources,
            pending: VecDeque::new(),
            ledger: QueryLedger::new(),
            evidence: Vec::new(),
            governor: IterationGovernor::for_research(config),
            last_verdict: None,
            rag_consulted: false,
            cancelled: false,
        }
    }

    /// Reflection rounds completed.
    pub fn loop_count(&self) -> u32 {
        self.governor.count()
    }

    /// Distinct citable sources, in first-seen order.
    pub fn sources(&self) -> Vec<Source> {
        let mut sources: Vec<Source> = Vec::new();
        for source in self.evidence.iter().filter_map(|e| e.source.as_ref()) {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources
    }
}

/// Merge evidence into one text, numbering and labeling each item by origin.
pub fn label_evidence(evidence: &[Evidence]) -> String {
    let mut rag_index = 0;
    let mut web_index = 0;
    let blocks: Vec<String> = evidence
        .iter()
        .filter(|e| !e.is_empty())
        .map(|e| {
            let (label, index) = match e.origin {
                EvidenceOrigin::Rag => {
                    rag_index += 1;
                    ("KNOWLEDGE BASE SOURCE", rag_index)
                }
                EvidenceOrigin::Web => {
                    web_index += 1;
                    ("WEB RESEARCH SOURCE", web_index)
                }
            };
            format!(
                "=== {label} {index} ===\n{}\n=== END {label} {index} ===",
                e.content.trim()
            )
        })
        .collect();

    if blocks.is_empty() {
        NO_RESEARCH_CONTENT.to_string()
    } else {
        blocks.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_label_evidence() {
        let evidence = vec![
            Evidence::web("web one", 1.0),
            Evidence::rag("kb one", 0.9),
            Evidence::web("   ", 0.5),
            Evidence::web("web two", 0.8),
        ];
        assert_eq!(
            label_evidence(&evidence),
            "=== WEB RESEARCH SOURCE 1 ===\nweb one\n=== END WEB RESEARCH SOURCE 1 ===\n\n\
             === KNOWLEDGE BASE SOURCE 1 ===\nkb one\n=== END KNOWLEDGE BASE SOURCE 1 ===\n\n\
             === WEB RESEARCH SOURCE 2 ===\nweb two\n=== END WEB RESEARCH SOURCE 2 ==="
        );
        assert_eq!(label_evidence(&[]), NO_RESEARCH_CONTENT);
    }

    #[test]
    fn test_sources_deduplicated() {
        let config = ResearchConfig::default();
        let mut state = ResearchState::new("topic", Vec::new(), &config);
        state.evidence = vec![
            Evidence::web("a", 1.0).with_source("A", "https://a"),
            Evidence::web("a again", 0.9).with_source("A", "https://a"),
            Evidence::rag("b", 0.5).with_source("B", "knowledge-base://B"),
            Evidence::web("no source", 0.1),
        ];
        let urls: Vec<String> = state.sources().into_iter().map(|s| s.url).collect();
        assert_eq!(urls, vec!["https://a", "knowledge-base://B"]);
        assert_eq!(state.loop_count(), 0);
    }
}
