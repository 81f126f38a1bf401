//! Long-report pipeline: plan, process every section, compile.

use tracing::{info, instrument, warn};

use crate::error::Result;
use crate::events::ProgressKind;
use crate::governor::IterationGovernor;
use crate::retrieval::Resource;
use crate::runtime::{RequestScope, Toolkit};

use super::compiler::{compile, FinalReport};
use super::planner::ReportPlanner;
use super::progress::ReportSession;
use super::section::{SectionCursor, SectionProcessor, SectionStep};

/// Runs one long-report request end to end.
#[derive(Clone)]
pub struct ReportWriter {
    toolkit: Toolkit,
    planner: ReportPlanner,
    processor: SectionProcessor,
}

impl ReportWriter {
    pub fn new(toolkit: Toolkit) -> Self {
        Self {
            planner: ReportPlanner::new(toolkit.clone()),
            processor: SectionProcessor::new(toolkit.clone()),
            toolkit,
        }
    }

    /// Write a report on `topic`. On cancellation the sections completed so
    /// far are compiled with placeholders for the rest.
    #[instrument(skip(self, resources, scope), fields(request_id = %scope.id))]
    pub async fn write(
        &self,
        topic: &str,
        target_words: usize,
        resources: Vec<Resource>,
        scope: &RequestScope,
    ) -> Result<FinalReport> {
        let plan = self.planner.plan(topic, target_words, scope).await?;
        let mut session = ReportSession::new(topic, plan, resources);
        let mut governor = IterationGovernor::for_report(session.plan.len());
        let mut cancelled = false;

        while !governor.is_exhausted() {
            governor.record();
            let outcome = self
                .processor
                .process(session, SectionCursor::Next, scope)
                .await;
            session = outcome.session;
            match outcome.step {
                SectionStep::Completed(_) | SectionStep::AlreadyCompleted { .. } => {}
                SectionStep::NoMoreSections => break,
                SectionStep::Cancelled => {
                    cancelled = true;
                    break;
                }
            }
        }
        if !cancelled && !session.is_complete() {
            warn!(
                ceiling = governor.ceiling(),
                "Report loop ceiling reached before every section completed"
            );
        }

        let mut report = compile(Some(&session.plan), &session.completed)?;
        report.cancelled = cancelled;

        if cancelled {
            warn!(
                completed = session.completed.len(),
                total = session.plan.len(),
                "Report cancelled, returning partial report"
            );
            self.toolkit.emit(
                scope,
                ProgressKind::Cancelled {
                    stage: "report".to_string(),
                },
            );
        } else {
            info!(words = report.word_count, "Report compiled");
        }
        self.toolkit.emit(
            scope,
            ProgressKind::ReportCompiled {
                word_count: report.word_count,
                sections: report.section_count,
                missing: report.missing_sections.len(),
            },
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::generator::Purpose;
    use crate::testing::{CallLog, Harness, ScriptedGenerator};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_ai_in_healthcare_scenario() {
        let log = CallLog::default();
        let generator = ScriptedGenerator::new(log.clone())
            .always(Purpose::Planning, "I would structure it in four parts.")
            .always(Purpose::SectionQueries, r#"{"queries": ["AI diagnostics accuracy"]}"#)
            .always(
                Purpose::SectionReflection,
                r#"{"is_sufficient": true, "follow_up_queries": []}"#,
            )
            .always(Purpose::SectionDraft, "Section body with evidence [1].");
        let harness = Harness::new(generator, log.clone(), ResearchConfig::default());

        let report = ReportWriter::new(harness.toolkit.clone())
            .write("AI in healthcare", 10_000, Vec::new(), &RequestScope::new())
            .await
            .unwrap();

        let sections = harness.sink.sections();
        assert!(sections.len() >= 4);
        let order: Vec<usize> = sections.iter().map(|s| s.completed_index).collect();
        assert_eq!(order, (0..sections.len()).collect::<Vec<_>>());
        for section in &sections {
            assert!(report.text.contains(&format!("## {}", section.name)));
        }
        assert!(report.is_complete());
        assert!(!report.cancelled);

        let plan_event = harness
            .sink
            .events()
            .into_iter()
            .find_map(|e| match e.kind {
                ProgressKind::PlanGenerated { fallback, .. } => Some(fallback),
                _ => None,
            });
        assert_eq!(plan_event, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_partial_report() {
        let log = CallLog::default();
        let generator = ScriptedGenerator::new(log.clone())
            .always(Purpose::Planning, "no structure")
            .always(Purpose::SectionQueries, r#"{"queries": ["storage"]}"#)
            .always(
                Purpose::SectionReflection,
                r#"{"is_sufficient": true, "follow_up_queries": []}"#,
            )
            .then(Purpose::SectionDraft, "## Introduction\n\nDone.")
            .then_hang(Purpose::SectionDraft);
        let config = ResearchConfig::default()
            .with_timeouts(Duration::from_secs(600), Duration::from_secs(600));
        let harness = Harness::new(generator, log.clone(), config);
        let cancel = CancellationToken::new();
        let scope = RequestScope::with_cancel(cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            cancel.cancel();
        });
        let report = ReportWriter::new(harness.toolkit.clone())
            .write("batteries", 1000, Vec::new(), &scope)
            .await
            .unwrap();
        trigger.await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.section_count, 4);
        assert_eq!(
            report.missing_sections,
            vec!["Literature Review", "Core Analysis", "Conclusion"]
        );
        assert!(report.text.contains("## Introduction\n\nDone."));
    }
}
