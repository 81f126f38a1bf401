//! Request classification: standard answer or long report.
//!
//! The classifier is a pure function of the latest user message. It looks
//! for long-report phrases in English and Chinese and for word-count hints
//! in several units (`N words`, `Nk words`, `N千字`, `N万字`, `N字`). It
//! never fails: a message with no signal is a standard request.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::context::Conversation;

/// Phrases that ask for a long, structured report.
const LONG_REPORT_KEYWORDS: &[&str] = &[
    "详细报告",
    "研究报告",
    "深度分析",
    "全面报告",
    "长篇报告",
    "万字",
    "字的报告",
    "detailed report",
    "research report",
    "comprehensive analysis",
    "in-depth report",
    "long report",
];

// Word-count hints, from highest to lowest precedence
static WORDS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:,\d{3})+|\d+)\s*words?\b").expect("invalid regex")
});
static K_WORDS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*k\s*words?\b").expect("invalid regex"));
static QIAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*千字").expect("invalid regex"));
static WAN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*万字").expect("invalid regex"));
static ZI_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*字").expect("invalid regex"));

/// Which pipeline handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchMode {
    /// Research loop with a single synthesized answer
    Standard,
    /// Planned multi-section report
    LongReport,
}

impl std::fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::LongReport => write!(f, "long_report"),
        }
    }
}

/// Classification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDecision {
    pub mode: ResearchMode,
    /// Requested length, or the configured default
    pub target_word_count: usize,
    /// Whether the count came from the message
    pub explicit_count: bool,
    /// Human-readable reason for the decision
    pub reason: String,
}

impl RequestDecision {
    pub fn is_long_report(&self) -> bool {
        self.mode == ResearchMode::LongReport
    }
}

/// Keyword and word-count based request classifier.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    default_target: usize,
}

impl Default for RequestClassifier {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl RequestClassifier {
    pub fn new(default_target: usize) -> Self {
        Self {
            default_target: default_target.max(1),
        }
    }

    /// Classify a conversation by its latest user message.
    pub fn classify_conversation(&self, conversation: &Conversation) -> RequestDecision {
        let message = conversation
            .latest_user_message()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        self.classify(message)
    }

    /// Classify a single message.
    pub fn classify(&self, message: &str) -> RequestDecision {
        let lower = message.to_lowercase();
        let keyword = LONG_REPORT_KEYWORDS
            .iter()
            .find(|k| lower.contains(&k.to_lowercase()));
        let count = extract_word_count(message);

        let mode = if keyword.is_some() || count.is_some() {
            ResearchMode::LongReport
        } else {
            ResearchMode::Standard
        };

        let reason = match (keyword, count) {
            (Some(k), Some(n)) => format!("keyword '{}' with {} word target", k, n),
            (Some(k), None) => format!("keyword '{}'", k),
            (None, Some(n)) => format!("{} word target requested", n),
            (None, None) => "no long-report signal".to_string(),
        };

        RequestDecision {
            mode,
            target_word_count: count.unwrap_or(self.default_target),
            explicit_count: count.is_some(),
            reason,
        }
    }
}

fn capture_number(pattern: &Regex, text: &str) -> Option<u64> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().replace(',', "").parse::<u64>().ok())
        .find(|n| *n > 0)
}

/// The requested word count, honoring unit precedence:
/// `words` > `k words` > `千字` > `万字` > `字`. Zero is ignored.
pub fn extract_word_count(message: &str) -> Option<usize> {
    let candidates: [(&Regex, u64); 5] = [
        (&WORDS_PATTERN, 1),
        (&K_WORDS_PATTERN, 1_000),
        (&QIAN_PATTERN, 1_000),
        (&WAN_PATTERN, 10_000),
        (&ZI_PATTERN, 1),
    ];
    candidates.iter().find_map(|(pattern, unit)| {
        capture_number(pattern, message)
            .map(|n| n.saturating_mul(*unit))
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
    })
}
