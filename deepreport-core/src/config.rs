//! Research configuration: iteration ceilings, budgets, retrieval settings.
//!
//! Every bound the pipelines enforce comes from here. Values can be built in
//! code (`Default` plus `with_*` builders) or read from the environment with
//! [`ResearchConfig::from_env`]. [`ResearchConfig::validate`] checks the whole
//! configuration without touching any external service.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Hard cap on the section synthesis token budget.
pub const SECTION_TOKEN_CAP: u32 = 16_384;

/// One entry of the canned outline used when planning falls back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    /// Section name
    pub name: String,
    /// What the section should cover
    pub description: String,
    /// Whether the section needs evidence retrieval
    pub requires_research: bool,
    /// Share of the target word count, in percent
    pub percent: u32,
}

impl OutlineEntry {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        requires_research: bool,
        percent: u32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            requires_research,
            percent,
        }
    }
}

/// The default four-part outline: 20 / 30 / 35 / 15.
pub fn default_outline() -> Vec<OutlineEntry> {
    vec![
        OutlineEntry::new(
            "Introduction",
            "Background, motivation and goals of the research",
            true,
            20,
        ),
        OutlineEntry::new(
            "Literature Review",
            "Related work and theoretical foundations",
            true,
            30,
        ),
        OutlineEntry::new(
            "Core Analysis",
            "Main analysis of the topic with supporting evidence",
            true,
            35,
        ),
        OutlineEntry::new(
            "Conclusion",
            "Summary of findings and recommendations",
            false,
            15,
        ),
    ]
}

/// Knowledge-base retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagSettings {
    /// Whether a knowledge base may be consulted at all
    pub enabled: bool,
    /// Consult the knowledge base even when no resources were requested
    pub general_use: bool,
    /// Fall back to web search when the knowledge base returns nothing
    pub enable_fallback: bool,
    /// Maximum documents kept per knowledge-base query
    pub max_documents: usize,
    /// Minimum similarity for a chunk to count as evidence
    pub similarity_threshold: f64,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            general_use: false,
            enable_fallback: true,
            max_documents: 5,
            similarity_threshold: 0.1,
        }
    }
}

/// Configuration for both research pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Number of queries requested in the first step of standard mode
    pub number_of_initial_queries: usize,
    /// Ceiling on reflection rounds in standard mode
    pub max_research_loops: u32,
    /// Extra research rounds allowed per section (clamped to at most 1)
    pub section_extra_iterations: u32,
    /// Maximum queries generated for a single section
    pub max_section_queries: usize,
    /// Target word count used when the request names none
    pub default_target_words: usize,
    /// Smallest target word count a plan is built for
    pub min_target_words: usize,
    /// Base token budget for generator calls
    pub max_tokens: u32,
    /// Characters of prior sections shown to summarizing sections
    pub summary_context_chars: usize,
    /// Characters of evidence shown to a section synthesis call
    pub evidence_chars: usize,
    /// Web results per query in standard mode
    pub web_max_results: usize,
    /// Web results per query while researching a section
    pub section_web_max_results: usize,
    /// Timeout for one generator call, in seconds
    pub generation_timeout_secs: u64,
    /// Timeout for one retrieval call, in seconds
    pub retrieval_timeout_secs: u64,
    /// Knowledge-base settings
    pub rag: RagSettings,
    /// Outline used when the planner cannot parse a structured plan
    pub fallback_outline: Vec<OutlineEntry>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            number_of_initial_queries: 3,
            max_research_loops: 2,
            section_extra_iterations: 1,
            max_section_queries: 5,
            default_target_words: 10_000,
            min_target_words: 100,
            max_tokens: 4096,
            summary_context_chars: 2000,
            evidence_chars: 8000,
            web_max_results: 5,
            section_web_max_results: 3,
            generation_timeout_secs: 120,
            retrieval_timeout_secs: 45,
            rag: RagSettings::default(),
            fallback_outline: default_outline(),
        }
    }
}

impl ResearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let rag_defaults = RagSettings::default();

        Self {
            number_of_initial_queries: env_parse("NUMBER_OF_INITIAL_QUERIES")
                .unwrap_or(defaults.number_of_initial_queries),
            max_research_loops: env_parse("MAX_RESEARCH_LOOPS")
                .unwrap_or(defaults.max_research_loops),
            section_extra_iterations: env_parse("SECTION_EXTRA_ITERATIONS")
                .unwrap_or(defaults.section_extra_iterations),
            default_target_words: env_parse("DEFAULT_TARGET_WORD_COUNT")
                .unwrap_or(defaults.default_target_words),
            max_tokens: env_parse("MAX_TOKENS").unwrap_or(defaults.max_tokens),
            web_max_results: env_parse("WEB_MAX_RESULTS").unwrap_or(defaults.web_max_results),
            generation_timeout_secs: env_parse("GENERATION_TIMEOUT_SECS")
                .unwrap_or(defaults.generation_timeout_secs),
            retrieval_timeout_secs: env_parse("RETRIEVAL_TIMEOUT_SECS")
                .unwrap_or(defaults.retrieval_timeout_secs),
            rag: RagSettings {
                enabled: std::env::var("RAG_PROVIDER")
                    .map(|s| !s.trim().is_empty() && s.to_lowercase() != "none")
                    .unwrap_or(rag_defaults.enabled),
                general_use: env_flag("RAG_GENERAL_USE").unwrap_or(rag_defaults.general_use),
                enable_fallback: env_flag("RAG_ENABLE_FALLBACK")
                    .unwrap_or(rag_defaults.enable_fallback),
                max_documents: env_parse("RAG_MAX_DOCUMENTS")
                    .unwrap_or(rag_defaults.max_documents),
                similarity_threshold: env_parse("RAG_SIMILARITY_THRESHOLD")
                    .unwrap_or(rag_defaults.similarity_threshold),
            },
            ..defaults
        }
    }

    pub fn with_initial_queries(mut self, count: usize) -> Self {
        self.number_of_initial_queries = count;
        self
    }

    pub fn with_max_research_loops(mut self, loops: u32) -> Self {
        self.max_research_loops = loops;
        self
    }

    pub fn with_section_extra_iterations(mut self, extra: u32) -> Self {
        self.section_extra_iterations = extra;
        self
    }

    pub fn with_default_target_words(mut self, words: usize) -> Self {
        self.default_target_words = words;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_rag(mut self, rag: RagSettings) -> Self {
        self.rag = rag;
        self
    }

    pub fn with_fallback_outline(mut self, outline: Vec<OutlineEntry>) -> Self {
        self.fallback_outline = outline;
        self
    }

    pub fn with_timeouts(mut self, generation: Duration, retrieval: Duration) -> Self {
        self.generation_timeout_secs = generation.as_secs();
        self.retrieval_timeout_secs = retrieval.as_secs();
        self
    }

    /// Ceiling for the standard-mode research loop (never below 1).
    pub fn research_ceiling(&self) -> u32 {
        self.max_research_loops.max(1)
    }

    /// Ceiling for one section's research sub-loop: the first pass plus at
    /// most one extra round.
    pub fn section_ceiling(&self) -> u32 {
        1 + self.section_extra_iterations.min(1)
    }

    /// Token budget for section synthesis: double the base, capped.
    pub fn section_token_budget(&self) -> u32 {
        self.max_tokens.saturating_mul(2).min(SECTION_TOKEN_CAP)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs)
    }

    /// Check every value without contacting any external service.
    pub fn validate(&self) -> Result<()> {
        if self.number_of_initial_queries == 0 {
            return Err(Error::config("number_of_initial_queries must be at least 1"));
        }
        if self.max_research_loops == 0 {
            return Err(Error::config("max_research_loops must be at least 1"));
        }
        if self.max_section_queries == 0 {
            return Err(Error::config("max_section_queries must be at least 1"));
        }
        if self.default_target_words == 0 {
            return Err(Error::config("default_target_words must be positive"));
        }
        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be positive"));
        }
        if self.generation_timeout_secs == 0 || self.retrieval_timeout_secs == 0 {
            return Err(Error::config("timeouts must be positive"));
        }
        if !(0.0..=1.0).contains(&self.rag.similarity_threshold) {
            return Err(Error::config(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.rag.similarity_threshold
            )));
        }
        validate_outline(&self.fallback_outline)
    }
}

fn validate_outline(outline: &[OutlineEntry]) -> Result<()> {
    if outline.is_empty() {
        return Err(Error::config("fallback outline must not be empty"));
    }
    if let Some(entry) = outline.iter().find(|e| e.percent == 0) {
        return Err(Error::config(format!(
            "fallback outline entry '{}' has a zero share",
            entry.name
        )));
    }
    let total: u32 = outline.iter().map(|e| e.percent).sum();
    if total != 100 {
        return Err(Error::config(format!(
            "fallback outline shares must sum to 100, got {}",
            total
        )));
    }
    Ok(())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|s| s != "0" && s.to_lowercase() != "false")
}
