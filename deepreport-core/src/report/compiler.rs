//! Assembles the final report from the plan and the completed sections.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::text::count_words;

use super::plan::ReportPlan;
use super::progress::CompletedSections;

/// The compiled long report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    pub title: String,
    /// Markdown text
    pub text: String,
    pub word_count: usize,
    /// Blocks in the report, one per planned section
    pub section_count: usize,
    /// Planned sections that were never completed
    pub missing_sections: Vec<String>,
    /// Whether the request was cancelled before every section was written
    pub cancelled: bool,
}

impl FinalReport {
    pub fn is_complete(&self) -> bool {
        self.missing_sections.is_empty()
    }
}

/// Compile the report: title, abstract, then one block per planned section
/// in plan order. Sections missing from `completed` get a placeholder
/// block. Fails only when there is no plan.
pub fn compile(plan: Option<&ReportPlan>, completed: &CompletedSections) -> Result<FinalReport> {
    let plan = plan.ok_or(Error::MissingPlan)?;

    let mut missing_sections = Vec::new();
    let blocks: Vec<String> = plan
        .sections
        .iter()
        .map(|section| match completed.get(&section.name) {
            Some(done) => with_heading(&section.name, &done.content),
            None => {
                missing_sections.push(section.name.clone());
                format!(
                    "## {}\n\n*[Section \"{}\" was not completed.]*",
                    section.name, section.name
                )
            }
        })
        .collect();

    let mut text = format!("# {}\n\n", plan.title);
    if !plan.abstract_text.trim().is_empty() {
        text.push_str(&format!("## Abstract\n\n{}\n\n", plan.abstract_text.trim()));
    }
    text.push_str(&blocks.join("\n\n"));
    text.push('\n');

    Ok(FinalReport {
        title: plan.title.clone(),
        word_count: count_words(&text),
        section_count: blocks.len(),
        text,
        missing_sections,
        cancelled: false,
    })
}

/// `content` under a `## {name}` heading. A leading heading line in the
/// content is replaced.
fn with_heading(name: &str, content: &str) -> String {
    let content = content.trim();
    let body = match content.lines().next() {
        Some(first) if first.trim_start().starts_with('#') => content[first.len()..].trim_start(),
        _ => content,
    };
    if body.is_empty() {
        format!("## {}", name)
    } else {
        format!("## {}\n\n{}", name, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_outline;
    use crate::report::progress::CompletedSection;
    use pretty_assertions::assert_eq;

    fn done(index: usize, name: &str, content: &str) -> CompletedSection {
        CompletedSection {
            index,
            name: name.to_string(),
            description: String::new(),
            content: content.to_string(),
            research_iterations: 1,
            placeholder: false,
        }
    }

    #[test]
    fn test_missing_plan_is_fatal() {
        let err = compile(None, &CompletedSections::new()).unwrap_err();
        assert!(matches!(err, Error::MissingPlan));
    }

    #[test]
    fn test_blocks_follow_plan_order() {
        let plan = ReportPlan::fallback("batteries", 1000, &default_outline());
        let mut completed = CompletedSections::new();
        completed
            .append(done(2, "Core Analysis", "# Analysis\n\nCells age."))
            .unwrap();
        completed
            .append(done(0, "Introduction", "Batteries store energy."))
            .unwrap();

        let report = compile(Some(&plan), &completed).unwrap();

        let headings: Vec<&str> = report
            .text
            .lines()
            .filter(|l| l.starts_with("## ") && *l != "## Abstract")
            .collect();
        assert_eq!(
            headings,
            vec![
                "## Introduction",
                "## Literature Review",
                "## Core Analysis",
                "## Conclusion"
            ]
        );
        assert_eq!(report.section_count, plan.len());
        assert_eq!(report.missing_sections, vec!["Literature Review", "Conclusion"]);
        assert!(report.text.starts_with("# batteries Research Report\n\n## Abstract\n\n"));
        assert!(report.text.contains("## Core Analysis\n\nCells age."));
        assert!(!report.is_complete());
    }

    #[test]
    fn test_with_heading() {
        assert_eq!(with_heading("Intro", "## Intro\n\nBody"), "## Intro\n\nBody");
        assert_eq!(with_heading("Intro", "Body"), "## Intro\n\nBody");
        assert_eq!(with_heading("Intro", "# Other\nBody"), "## Intro\n\nBody");
        assert_eq!(with_heading("Intro", "   "), "## Intro");
    }

    #[test]
    fn test_word_count_mixes_scripts() {
        let plan = ReportPlan {
            title: "T".into(),
            abstract_text: String::new(),
            sections: vec![crate::report::plan::Section {
                name: "A".into(),
                description: String::new(),
                requires_research: false,
                target_words: 10,
            }],
            target_word_count: 10,
            fallback: false,
        };
        let mut completed = CompletedSections::new();
        completed.append(done(0, "A", "电池 two words")).unwrap();
        let report = compile(Some(&plan), &completed).unwrap();
        // heading markers are not words: "T", "A", 电, 池, "two", "words"
        assert_eq!(report.word_count, 6);
    }
}
