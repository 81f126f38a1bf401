//! Report planning with a deterministic fallback.

use tracing::{info, instrument, warn};

use crate::error::{Error, Result};
use crate::events::ProgressKind;
use crate::generator::{GenerationRequest, Purpose};
use crate::guard::CallOutcome;
use crate::parse::{DualParse, PlanDraft};
use crate::prompts;
use crate::runtime::{RequestScope, Toolkit};

use super::plan::ReportPlan;

/// Produces the [`ReportPlan`] for a long-report request.
#[derive(Clone)]
pub struct ReportPlanner {
    toolkit: Toolkit,
}

impl ReportPlanner {
    pub fn new(toolkit: Toolkit) -> Self {
        Self { toolkit }
    }

    /// Plan a report on `topic` of about `target_words` words.
    ///
    /// A structured plan from the generator is used when it parses; any
    /// other outcome short of cancellation yields the configured fallback
    /// outline. The only error is [`Error::Cancelled`].
    #[instrument(skip(self, scope), fields(request_id = %scope.id))]
    pub async fn plan(
        &self,
        topic: &str,
        target_words: usize,
        scope: &RequestScope,
    ) -> Result<ReportPlan> {
        let config = &self.toolkit.config;
        let target = target_words.max(config.min_target_words).max(1);
        let request = GenerationRequest::new(Purpose::Planning, prompts::report_plan(topic, target))
            .with_max_tokens(config.max_tokens);

        let plan = match self.toolkit.generate(request, scope).await {
            CallOutcome::Completed(text) => match PlanDraft::parse(&text) {
                Ok(parsed) => ReportPlan::from_draft(parsed.value, topic, target),
                Err(err) => {
                    warn!(error = %err, "Plan not parseable, using fallback outline");
                    ReportPlan::fallback(topic, target, &config.fallback_outline)
                }
            },
            CallOutcome::Cancelled => return Err(Error::Cancelled),
            _ => ReportPlan::fallback(topic, target, &config.fallback_outline),
        };

        info!(
            title = %plan.title,
            sections = plan.len(),
            fallback = plan.fallback,
            "Report plan ready"
        );
        self.toolkit.emit(
            scope,
            ProgressKind::PlanGenerated {
                title: plan.title.clone(),
                sections: plan.section_names(),
                fallback: plan.fallback,
            },
        );
        Ok(plan)
    }
}
