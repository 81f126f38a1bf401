//! Writes one report section per invocation.
//!
//! The processor resolves which section to write, researches it if the
//! plan asks for research, drafts it and appends it to the session's
//! completed list. Re-invoking it for a section that is already completed
//! is a no-op: no generator or retriever call is made and nothing is
//! appended. A failed draft still completes the section, with placeholder
//! content that says so.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::events::{ProgressKind, SectionProgress};
use crate::generator::{GenerationRequest, Purpose};
use crate::governor::{IterationGovernor, LoopDecision};
use crate::guard::CallOutcome;
use crate::parse::{DualParse, QueryList, ReflectionVerdict};
use crate::prompts;
use crate::research::NO_RESEARCH_CONTENT;
use crate::retrieval::{format_web_results, Source};
use crate::runtime::{RequestScope, Toolkit};
use crate::text::truncate_chars;

use super::plan::Section;
use super::progress::{CompletedSection, ReportSession};

/// Which section to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionCursor {
    /// The session's cursor: first section not yet completed
    Next,
    /// An explicit plan index
    At(usize),
}

/// What one invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionStep {
    Completed(SectionProgress),
    AlreadyCompleted { index: usize },
    NoMoreSections,
    /// Cancelled before the section could be appended
    Cancelled,
}

/// The updated session plus what happened.
#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub session: ReportSession,
    pub step: SectionStep,
}

enum Draft {
    Written(String),
    Placeholder(String),
    Cancelled,
}

struct Research {
    blocks: Vec<String>,
    sources: Vec<Source>,
    iterations: u32,
    cancelled: bool,
}

impl Research {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            sources: Vec::new(),
            iterations: 0,
            cancelled: false,
        }
    }

    fn add_source(&mut self, source: Source) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    fn evidence_text(&self, max_chars: usize) -> String {
        if self.blocks.is_empty() {
            return NO_RESEARCH_CONTENT.to_string();
        }
        truncate_chars(&self.blocks.join("\n\n"), max_chars).to_string()
    }

    fn references(&self) -> String {
        if self.sources.is_empty() {
            return "None".to_string();
        }
        self.sources
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[{}] {} - {}", i + 1, s.title, s.url))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Advances a [`ReportSession`] one section at a time.
#[derive(Clone)]
pub struct SectionProcessor {
    toolkit: Toolkit,
}

impl SectionProcessor {
    pub fn new(toolkit: Toolkit) -> Self {
        Self { toolkit }
    }

    /// Write the section at `cursor` and append it to the session.
    #[instrument(skip(self, session, scope), fields(request_id = %scope.id))]
    pub async fn process(
        &self,
        mut session: ReportSession,
        cursor: SectionCursor,
        scope: &RequestScope,
    ) -> SectionOutcome {
        let index = match cursor {
            SectionCursor::Next => session.cursor(),
            SectionCursor::At(index) => index,
        };

        let Some(section) = session.plan.section(index).cloned() else {
            debug!(index, "No more sections");
            return SectionOutcome {
                session,
                step: SectionStep::NoMoreSections,
            };
        };
        if session.completed.contains(&section.name) {
            debug!(index, name = %section.name, "Section already completed");
            return SectionOutcome {
                session,
                step: SectionStep::AlreadyCompleted { index },
            };
        }
        if scope.is_cancelled() {
            return SectionOutcome {
                session,
                step: SectionStep::Cancelled,
            };
        }

        info!(
            index,
            name = %section.name,
            research = section.requires_research,
            "Processing section"
        );

        let (draft, iterations) = if section.requires_research {
            let research = self.research(&mut session, &section, scope).await;
            if research.cancelled {
                (Draft::Cancelled, research.iterations)
            } else {
                let draft = self.draft_from_research(&session, &section, &research, scope).await;
                (draft, research.iterations)
            }
        } else {
            (self.draft_direct(&session, &section, scope).await, 0)
        };

        let (content, placeholder) = match draft {
            Draft::Written(text) => (text, false),
            Draft::Placeholder(text) => (text, true),
            Draft::Cancelled => {
                return SectionOutcome {
                    session,
                    step: SectionStep::Cancelled,
                }
            }
        };

        let entry = CompletedSection {
            index,
            name: section.name.clone(),
            description: section.description.clone(),
            content,
            research_iterations: iterations,
            placeholder,
        };
        if let Err(err) = session.completed.append(entry) {
            warn!(error = %err, "Completed section rejected");
            return SectionOutcome {
                session,
                step: SectionStep::AlreadyCompleted { index },
            };
        }

        let Some(progress) = session.section_progress(index) else {
            return SectionOutcome {
                session,
                step: SectionStep::NoMoreSections,
            };
        };
        self.toolkit
            .emit(scope, ProgressKind::SectionProcessed(progress.clone()));
        SectionOutcome {
            session,
            step: SectionStep::Completed(progress),
        }
    }

    /// Research sub-loop: one pass over fresh queries, then at most one
    /// more pass on the follow-ups a reflection asks for.
    async fn research(
        &self,
        session: &mut ReportSession,
        section: &Section,
        scope: &RequestScope,
    ) -> Research {
        let config = &self.toolkit.config;
        let mut governor = IterationGovernor::for_section(config);
        let mut research = Research::new();

        let mut queries = match self.section_queries(session, section, scope).await {
            Some(queries) => queries,
            None => {
                research.cancelled = true;
                return research;
            }
        };

        loop {
            for query in queries {
                if !session.ledger.issue(&query) {
                    continue;
                }
                if !self.retrieve(session, &query, &mut research, scope).await {
                    research.cancelled = true;
                    return research;
                }
            }
            research.iterations = governor.record();
            if governor.is_exhausted() {
                break;
            }

            let verdict = self.reflect(section, &research, scope).await;
            let Some(verdict) = verdict else {
                research.cancelled = true;
                return research;
            };
            if let LoopDecision::Stop(cause) = governor.decide(verdict.is_sufficient) {
                debug!(?cause, section = %section.name, "Section research stopping");
                break;
            }

            queries = session.ledger.fresh(&verdict.follow_up_queries);
            queries.truncate(config.max_section_queries);
            if queries.is_empty() {
                break;
            }
        }
        research
    }

    /// Queries for a section, filtered against every query the report has
    /// issued. `None` when cancelled.
    async fn section_queries(
        &self,
        session: &ReportSession,
        section: &Section,
        scope: &RequestScope,
    ) -> Option<Vec<String>> {
        let max = self.toolkit.config.max_section_queries.max(1);
        let request = GenerationRequest::new(
            Purpose::SectionQueries,
            prompts::section_queries(&section.name, &section.description, section.target_words, max),
        );

        let candidates = match self.toolkit.generate(request, scope).await {
            CallOutcome::Completed(text) => QueryList::parse(&text)
                .map(|parsed| parsed.value.queries)
                .unwrap_or_default(),
            CallOutcome::Cancelled => return None,
            _ => Vec::new(),
        };

        let mut queries = session.ledger.fresh(candidates);
        queries.truncate(max);
        if queries.is_empty() {
            let fallback = format!("{} {}", section.name, section.description)
                .trim()
                .to_string();
            if session.ledger.contains(&fallback) {
                info!(section = %section.name, "Every candidate query was already issued");
            } else {
                queries.push(fallback);
            }
        }

        if !queries.is_empty() {
            self.toolkit.emit(
                scope,
                ProgressKind::QueriesGenerated {
                    queries: queries.clone(),
                },
            );
        }
        Some(queries)
    }

    /// Knowledge base (when it applies) then web for one query. Returns
    /// `false` when cancelled.
    async fn retrieve(
        &self,
        session: &ReportSession,
        query: &str,
        research: &mut Research,
        scope: &RequestScope,
    ) -> bool {
        if self.toolkit.rag_applies(&session.resources) {
            match self.toolkit.query_rag(query, &session.resources, scope).await {
                CallOutcome::Completed(evidence) if !evidence.is_empty() => {
                    let text = evidence
                        .iter()
                        .map(|e| e.content.trim())
                        .collect::<Vec<_>>()
                        .join("\n\n");
                    research
                        .blocks
                        .push(format!("Knowledge base results for '{}':\n{}", query, text));
                    for source in evidence.into_iter().filter_map(|e| e.source) {
                        research.add_source(source);
                    }
                }
                CallOutcome::Cancelled => return false,
                _ => {}
            }
        }

        let max_results = self.toolkit.config.section_web_max_results;
        match self.toolkit.search_web(query, max_results, scope).await {
            CallOutcome::Completed(results) => {
                research.blocks.push(format!(
                    "Web results for '{}':\n{}",
                    query,
                    format_web_results(&results)
                ));
                for result in results {
                    research.add_source(Source {
                        title: result.title,
                        url: result.url,
                    });
                }
                true
            }
            CallOutcome::Cancelled => false,
            _ => true,
        }
    }

    /// `None` when cancelled; a failed reflection is neutral.
    async fn reflect(
        &self,
        section: &Section,
        research: &Research,
        scope: &RequestScope,
    ) -> Option<ReflectionVerdict> {
        let evidence = research.evidence_text(self.toolkit.config.evidence_chars);
        let request = GenerationRequest::new(
            Purpose::SectionReflection,
            prompts::section_reflection(&section.name, &section.description, &evidence),
        );
        match self.toolkit.generate(request, scope).await {
            CallOutcome::Completed(text) => Some(
                ReflectionVerdict::parse(&text)
                    .map(|parsed| parsed.value)
                    .unwrap_or_else(|_| ReflectionVerdict::neutral()),
            ),
            CallOutcome::Cancelled => None,
            _ => Some(ReflectionVerdict::neutral()),
        }
    }

    async fn draft_from_research(
        &self,
        session: &ReportSession,
        section: &Section,
        research: &Research,
        scope: &RequestScope,
    ) -> Draft {
        let config = &self.toolkit.config;
        let prompt = prompts::section_research_draft(
            &session.plan.title,
            &section.name,
            &section.description,
            section.target_words,
            &research.evidence_text(config.evidence_chars),
            &research.references(),
        );
        let request = GenerationRequest::new(Purpose::SectionDraft, prompt)
            .with_max_tokens(config.section_token_budget());
        self.draft(section, request, scope).await
    }

    async fn draft_direct(
        &self,
        session: &ReportSession,
        section: &Section,
        scope: &RequestScope,
    ) -> Draft {
        let config = &self.toolkit.config;
        let prior = section.is_summarizing().then(|| {
            let written = session
                .completed
                .iter()
                .map(|s| s.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            truncate_chars(&written, config.summary_context_chars).to_string()
        });
        let prompt = prompts::section_direct_draft(
            &session.plan.title,
            &section.name,
            &section.description,
            section.target_words,
            prior.as_deref(),
        );
        let request =
            GenerationRequest::new(Purpose::SectionDraft, prompt).with_max_tokens(config.max_tokens);
        self.draft(section, request, scope).await
    }

    async fn draft(
        &self,
        section: &Section,
        request: GenerationRequest,
        scope: &RequestScope,
    ) -> Draft {
        match self.toolkit.generate(request, scope).await {
            CallOutcome::Completed(text) if !text.trim().is_empty() => Draft::Written(text),
            CallOutcome::Completed(_) => {
                Draft::Placeholder(section_placeholder(&section.name, "empty response"))
            }
            CallOutcome::Failed(err) => {
                Draft::Placeholder(section_placeholder(&section.name, &err.to_string()))
            }
            CallOutcome::TimedOut(limit) => Draft::Placeholder(section_placeholder(
                &section.name,
                &format!("timed out after {}s", limit.as_secs()),
            )),
            CallOutcome::Cancelled => Draft::Cancelled,
        }
    }
}

fn section_placeholder(name: &str, reason: &str) -> String {
    format!(
        "## {}\n\n*[Content for this section could not be generated: {}]*",
        name, reason
    )
}
