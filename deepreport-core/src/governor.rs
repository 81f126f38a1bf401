//! Iteration governor: the hard bound on every loop in the pipelines.
//!
//! Model output can claim "insufficient" forever. The governor counts
//! iterations against a ceiling taken from configuration and forces a stop
//! once the ceiling is reached, whatever the verdict says.

use serde::{Deserialize, Serialize};

use crate::config::ResearchConfig;

/// Which loop a governor bounds. Each kind has its own ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    /// Standard-mode generate/retrieve/reflect loop
    Research,
    /// Per-section research sub-loop
    Section,
    /// Section processor invocations for a whole report
    Report,
}

impl std::fmt::Display for LoopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Research => write!(f, "research"),
            Self::Section => write!(f, "section"),
            Self::Report => write!(f, "report"),
        }
    }
}

/// Why a governed loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopCause {
    /// The model reported the evidence sufficient
    Sufficient,
    /// The iteration ceiling was reached
    CeilingReached,
}

/// Result of consulting the governor after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopDecision {
    Continue,
    Stop(StopCause),
}

impl LoopDecision {
    pub fn should_stop(&self) -> bool {
        matches!(self, Self::Stop(_))
    }
}

/// Counts iterations of one loop against a fixed ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationGovernor {
    kind: LoopKind,
    ceiling: u32,
    count: u32,
}

impl IterationGovernor {
    /// Create a governor. A ceiling of zero is raised to one so every loop
    /// runs at least once and still terminates.
    pub fn new(kind: LoopKind, ceiling: u32) -> Self {
        Self {
            kind,
            ceiling: ceiling.max(1),
            count: 0,
        }
    }

    pub fn for_research(config: &ResearchConfig) -> Self {
        Self::new(LoopKind::Research, config.research_ceiling())
    }

    pub fn for_section(config: &ResearchConfig) -> Self {
        Self::new(LoopKind::Section, config.section_ceiling())
    }

    /// Bound on processor invocations for a plan with `total_sections`
    /// sections: one per section plus the final "no more sections" call.
    pub fn for_report(total_sections: usize) -> Self {
        let ceiling = u32::try_from(total_sections.saturating_add(1)).unwrap_or(u32::MAX);
        Self::new(LoopKind::Report, ceiling)
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling.saturating_sub(self.count)
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.ceiling
    }

    /// Record one completed iteration. Returns the new count.
    pub fn record(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Decide whether the loop continues given the model's verdict.
    ///
    /// The ceiling always wins over the verdict.
    pub fn decide(&self, model_says_sufficient: bool) -> LoopDecision {
        if model_says_sufficient {
            LoopDecision::Stop(StopCause::Sufficient)
        } else if self.is_exhausted() {
            LoopDecision::Stop(StopCause::CeilingReached)
        } else {
            LoopDecision::Continue
        }
    }

    /// Record an iteration and decide in one step.
    pub fn record_and_decide(&mut self, model_says_sufficient: bool) -> LoopDecision {
        self.record();
        self.decide(model_says_sufficient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_overrides_verdict() {
        let mut governor = IterationGovernor::new(LoopKind::Research, 2);
        assert_eq!(governor.record_and_decide(false), LoopDecision::Continue);
        assert_eq!(
            governor.record_and_decide(false),
            LoopDecision::Stop(StopCause::CeilingReached)
        );
        assert!(governor.is_exhausted());
        assert_eq!(governor.remaining(), 0);
    }

    #[test]
    fn test_sufficient_stops_early() {
        let mut governor = IterationGovernor::new(LoopKind::Section, 2);
        assert_eq!(
            governor.record_and_decide(true),
            LoopDecision::Stop(StopCause::Sufficient)
        );
        assert_eq!(governor.count(), 1);
    }

    #[test]
    fn test_zero_ceiling_raised() {
        let governor = IterationGovernor::new(LoopKind::Research, 0);
        assert_eq!(governor.ceiling(), 1);
    }

    #[test]
    fn test_from_config() {
        let config = ResearchConfig::new()
            .with_max_research_loops(4)
            .with_section_extra_iterations(3);
        assert_eq!(IterationGovernor::for_research(&config).ceiling(), 4);
        assert_eq!(IterationGovernor::for_section(&config).ceiling(), 2);
        assert_eq!(IterationGovernor::for_report(4).ceiling(), 5);
        assert_eq!(IterationGovernor::for_report(4).kind(), LoopKind::Report);
    }
}
