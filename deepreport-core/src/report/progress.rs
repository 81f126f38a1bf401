//! Report-scoped session: the plan, the append-only list of completed
//! sections and the query ledger.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::SectionProgress;
use crate::queries::QueryLedger;
use crate::retrieval::Resource;

use super::plan::ReportPlan;

/// A written section. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSection {
    /// Position in the plan
    pub index: usize,
    pub name: String,
    pub description: String,
    pub content: String,
    /// Research passes spent on the section (0 for direct sections)
    pub research_iterations: u32,
    /// Whether `content` is a placeholder for a failed draft
    pub placeholder: bool,
}

/// Append-only list of completed sections, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSections(Vec<CompletedSection>);

impl CompletedSections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `section`; a name that is already present is rejected.
    pub fn append(&mut self, section: CompletedSection) -> Result<()> {
        if self.contains(&section.name) {
            return Err(Error::duplicate_section(&section.name));
        }
        self.0.push(section);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|s| s.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&CompletedSection> {
        self.0.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompletedSection> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&CompletedSection> {
        self.0.last()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read-only progress summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub last_completed_index: Option<usize>,
    /// Always equal to the length of the completed list
    pub completed_count: usize,
    pub total: usize,
}

/// State of one long-report request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSession {
    pub topic: String,
    pub resources: Vec<Resource>,
    pub plan: ReportPlan,
    pub completed: CompletedSections,
    /// Queries issued across every section of this report
    pub ledger: QueryLedger,
}

impl ReportSession {
    pub fn new(topic: impl Into<String>, plan: ReportPlan, resources: Vec<Resource>) -> Self {
        Self {
            topic: topic.into(),
            resources,
            plan,
            completed: CompletedSections::new(),
            ledger: QueryLedger::new(),
        }
    }

    /// The section cursor: first plan index not yet completed, or the plan
    /// length when every section is done.
    pub fn cursor(&self) -> usize {
        self.plan
            .sections
            .iter()
            .position(|s| !self.completed.contains(&s.name))
            .unwrap_or(self.plan.len())
    }

    pub fn is_complete(&self) -> bool {
        self.cursor() >= self.plan.len()
    }

    pub fn progress(&self) -> ProgressState {
        ProgressState {
            last_completed_index: self.completed.last().map(|s| s.index),
            completed_count: self.completed.len(),
            total: self.plan.len(),
        }
    }

    /// Event payload for a freshly completed section.
    pub(crate) fn section_progress(&self, index: usize) -> Option<SectionProgress> {
        let section = self.plan.section(index)?;
        Some(SectionProgress {
            completed_index: index,
            name: section.name.clone(),
            description: section.description.clone(),
            completed_count: self.completed.len(),
            total: self.plan.len(),
        })
    }
}
