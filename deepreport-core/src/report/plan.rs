//! Report plans and word-count apportioning.

use serde::{Deserialize, Serialize};

use crate::config::OutlineEntry;
use crate::parse::PlanDraft;
use crate::text::truncate_chars;

const SUMMARIZING_MARKERS: &[&str] = &["conclusion", "summary", "总结", "结论"];

const MAX_TITLE_TOPIC_CHARS: usize = 80;

/// One planned section. Immutable once the plan exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Unique within the plan
    pub name: String,
    pub description: String,
    pub requires_research: bool,
    /// Always positive
    pub target_words: usize,
}

impl Section {
    /// Whether the section summarizes the ones before it.
    pub fn is_summarizing(&self) -> bool {
        let name = self.name.to_lowercase();
        SUMMARIZING_MARKERS.iter().any(|m| name.contains(m))
    }
}

/// The structure of a long report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPlan {
    pub title: String,
    pub abstract_text: String,
    /// Never empty
    pub sections: Vec<Section>,
    pub target_word_count: usize,
    /// Whether the plan came from the canned outline
    pub fallback: bool,
}

impl ReportPlan {
    /// Deterministic plan from a canned outline. Section targets sum to
    /// `target_words` exactly.
    pub fn fallback(topic: &str, target_words: usize, outline: &[OutlineEntry]) -> Self {
        let target = target_words.max(outline.len()).max(1);
        let weights: Vec<u32> = outline.iter().map(|e| e.percent).collect();
        let shares = apportion(target, &weights);

        let sections = outline
            .iter()
            .zip(shares)
            .map(|(entry, target_words)| Section {
                name: entry.name.clone(),
                description: entry.description.clone(),
                requires_research: entry.requires_research,
                target_words,
            })
            .collect();

        Self {
            title: default_title(topic),
            abstract_text: format!(
                "This report examines {} in {} sections covering background, related work, \
                 core analysis and conclusions.",
                title_topic(topic),
                outline.len()
            ),
            sections: with_unique_names(sections),
            target_word_count: target,
            fallback: true,
        }
    }

    /// Plan from a parsed model draft. Missing section targets get an even
    /// share of the total; repeated names are suffixed.
    pub fn from_draft(draft: PlanDraft, topic: &str, target_words: usize) -> Self {
        let target = target_words.max(1);
        let even_share = (target / draft.sections.len().max(1)).max(1);

        let sections = draft
            .sections
            .into_iter()
            .map(|s| Section {
                name: s.name,
                description: s.description,
                requires_research: s.requires_research,
                target_words: s.word_count_target.filter(|n| *n > 0).unwrap_or(even_share),
            })
            .collect();

        let title = if draft.title.is_empty() {
            default_title(topic)
        } else {
            draft.title
        };

        Self {
            title,
            abstract_text: draft.abstract_text,
            sections: with_unique_names(sections),
            target_word_count: target,
            fallback: false,
        }
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    /// Sum of the section targets.
    pub fn planned_words(&self) -> usize {
        self.sections.iter().map(|s| s.target_words).sum()
    }
}

/// Split `total` in proportion to `weights`. Each share is floored and the
/// remainder goes to the first largest weight, so shares sum to `total`.
/// When `total` allows it, no share is zero.
pub fn apportion(total: usize, weights: &[u32]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }
    let weight_sum: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if weight_sum == 0 {
        let mut shares = vec![total / weights.len(); weights.len()];
        shares[0] += total % weights.len();
        return shares;
    }

    let mut shares: Vec<usize> = weights
        .iter()
        .map(|w| ((total as u128 * u128::from(*w)) / u128::from(weight_sum)) as usize)
        .collect();

    let largest = largest_index(weights);
    let assigned: usize = shares.iter().sum();
    shares[largest] += total - assigned;

    if total >= shares.len() {
        while let Some(zero) = shares.iter().position(|s| *s == 0) {
            let donor = largest_index(&shares);
            shares[donor] -= 1;
            shares[zero] += 1;
        }
    }
    shares
}

fn largest_index<T: Ord + Copy>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn with_unique_names(sections: Vec<Section>) -> Vec<Section> {
    let mut seen: Vec<String> = Vec::with_capacity(sections.len());
    sections
        .into_iter()
        .map(|mut section| {
            if seen.contains(&section.name) {
                let base = section.name.clone();
                let mut n = 2;
                while seen.contains(&format!("{} ({})", base, n)) {
                    n += 1;
                }
                section.name = format!("{} ({})", base, n);
            }
            seen.push(section.name.clone());
            section
        })
        .collect()
}

fn title_topic(topic: &str) -> &str {
    let first_line = topic.lines().find(|l| !l.trim().is_empty()).unwrap_or(topic);
    truncate_chars(first_line.trim(), MAX_TITLE_TOPIC_CHARS)
}

fn default_title(topic: &str) -> String {
    format!("{} Research Report", title_topic(topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_outline;
    use crate::parse::SectionDraft;
    use pretty_assertions::assert_eq;

    fn draft_section(name: &str, target: Option<usize>) -> SectionDraft {
        SectionDraft {
            name: name.to_string(),
            description: format!("{} description", name),
            requires_research: true,
            word_count_target: target,
        }
    }

    #[test]
    fn test_apportion_default_shares() {
        assert_eq!(apportion(10_000, &[20, 30, 35, 15]), vec![2000, 3000, 3500, 1500]);
        // 1001 * 35% = 350.35, remainder lands on the largest weight
        let shares = apportion(1001, &[20, 30, 35, 15]);
        assert_eq!(shares, vec![200, 300, 351, 150]);
        assert_eq!(shares.iter().sum::<usize>(), 1001);
    }

    #[test]
    fn test_apportion_no_zero_share() {
        let shares = apportion(5, &[1, 1, 97, 1]);
        assert_eq!(shares.iter().sum::<usize>(), 5);
        assert!(shares.iter().all(|s| *s > 0));
    }

    #[test]
    fn test_fallback_plan() {
        let plan = ReportPlan::fallback("AI in healthcare", 10_000, &default_outline());
        assert!(plan.fallback);
        assert_eq!(plan.title, "AI in healthcare Research Report");
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.planned_words(), 10_000);
        assert!(!plan.sections[3].requires_research);
        assert!(plan.sections[3].is_summarizing());
    }

    #[test]
    fn test_from_draft_fills_targets_and_dedupes_names() {
        let draft = PlanDraft {
            title: String::new(),
            abstract_text: "About tides.".into(),
            sections: vec![
                draft_section("Overview", Some(1000)),
                draft_section("Overview", None),
                draft_section("Overview", Some(500)),
            ],
        };
        let plan = ReportPlan::from_draft(draft, "Tidal power", 3000);
        assert!(!plan.fallback);
        assert_eq!(plan.title, "Tidal power Research Report");
        assert_eq!(
            plan.section_names(),
            vec!["Overview", "Overview (2)", "Overview (3)"]
        );
        assert_eq!(plan.sections[1].target_words, 1000);
        assert_eq!(plan.section(2).map(|s| s.target_words), Some(500));
    }

    #[test]
    fn test_multiline_topic_title() {
        let plan = ReportPlan::fallback("User: batteries\nAssistant: ok", 1000, &default_outline());
        assert_eq!(plan.title, "User: batteries Research Report");
    }
}
