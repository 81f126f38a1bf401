//! Request-scoped record of issued search queries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::text::normalize_query;

/// Every query issued during one request, deduplicated after
/// normalization. Owned by the request's state, never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryLedger {
    seen: HashSet<String>,
    issued: Vec<String>,
}

impl QueryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, query: &str) -> bool {
        self.seen.contains(&normalize_query(query))
    }

    /// Record `query` as issued. Returns `false` (and records nothing) for
    /// blank queries and queries already issued.
    pub fn issue(&mut self, query: &str) -> bool {
        let key = normalize_query(query);
        if key.is_empty() || !self.seen.insert(key) {
            return false;
        }
        self.issued.push(query.trim().to_string());
        true
    }

    /// Keep only queries that are new to the ledger and to each other.
    /// Nothing is recorded.
    pub fn fresh<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut local = HashSet::new();
        candidates
            .into_iter()
            .filter_map(|q| {
                let key = normalize_query(q.as_ref());
                if key.is_empty() || self.seen.contains(&key) || !local.insert(key) {
                    None
                } else {
                    Some(q.as_ref().trim().to_string())
                }
            })
            .collect()
    }

    /// Issued queries in order.
    pub fn issued(&self) -> &[String] {
        &self.issued
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_issue_normalizes() {
        let mut ledger = QueryLedger::new();
        assert!(ledger.issue("AI in Healthcare"));
        assert!(!ledger.issue("  ai   in healthcare "));
        assert!(!ledger.issue("   "));
        assert!(ledger.contains("AI IN HEALTHCARE"));
        assert_eq!(ledger.issued(), &["AI in Healthcare".to_string()]);
    }

    #[test]
    fn test_fresh_filters_both_ways() {
        let mut ledger = QueryLedger::new();
        ledger.issue("diagnostic AI");
        let fresh = ledger.fresh(["Diagnostic  AI", "AI triage", "ai triage", "", "AI billing"]);
        assert_eq!(fresh, vec!["AI triage", "AI billing"]);
        assert_eq!(ledger.len(), 1);
    }
}
