//! Standard-mode research loop.
//!
//! `GENERATE_QUERY -> RETRIEVE -> REFLECT -> {FINALIZE | CONTINUE -> RETRIEVE}`
//!
//! Each step consumes a [`ResearchState`] and returns the updated one. No
//! step failure aborts the loop: a failed call degrades to an empty or
//! neutral result and the loop moves on. Termination is owned by the
//! [`IterationGovernor`](crate::governor::IterationGovernor) inside the
//! state, so neither the caller nor the model can keep the loop alive past
//! its ceiling.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::events::ProgressKind;
use crate::generator::{GenerationRequest, Purpose};
use crate::governor::{LoopDecision, StopCause};
use crate::guard::CallOutcome;
use crate::parse::{DualParse, QueryList, ReflectionVerdict};
use crate::prompts;
use crate::retrieval::{EvidenceOrigin, Resource, Source};
use crate::runtime::{RequestScope, Toolkit};

use super::state::{label_evidence, ResearchState};

/// Result of a standard-mode request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchAnswer {
    /// Synthesized answer, or the evidence digest when synthesis was skipped
    pub text: String,
    /// Reflection rounds completed
    pub loops: u32,
    /// Queries issued, in order
    pub queries: Vec<String>,
    pub sources: Vec<Source>,
    pub evidence_count: usize,
    pub cancelled: bool,
    /// Whether the text is a placeholder rather than a synthesized answer
    pub degraded: bool,
}

/// Drives one standard-mode request.
#[derive(Clone)]
pub struct ResearchController {
    toolkit: Toolkit,
}

impl ResearchController {
    pub fn new(toolkit: Toolkit) -> Self {
        Self { toolkit }
    }

    /// Run the loop to completion for `topic`.
    #[instrument(skip(self, resources, scope), fields(request_id = %scope.id))]
    pub async fn run(
        &self,
        topic: &str,
        resources: Vec<Resource>,
        scope: &RequestScope,
    ) -> ResearchAnswer {
        let state = ResearchState::new(topic, resources, &self.toolkit.config);
        let mut state = self.generate_queries(state, scope).await;

        while !state.cancelled {
            state = self.retrieve(state, scope).await;
            if state.cancelled {
                break;
            }

            let (next, decision) = self.reflect(state, scope).await;
            state = next;
            match decision {
                LoopDecision::Stop(cause) => {
                    debug!(?cause, loops = state.loop_count(), "Research loop stopping");
                    break;
                }
                LoopDecision::Continue => {}
            }

            let (next, continued) = self.continue_research(state);
            state = next;
            if !continued {
                break;
            }
        }

        self.finalize(state, scope).await
    }

    /// Ask the generator for initial queries. Always leaves at least one
    /// query pending.
    pub async fn generate_queries(
        &self,
        mut state: ResearchState,
        scope: &RequestScope,
    ) -> ResearchState {
        let wanted = self.toolkit.config.number_of_initial_queries.max(1);
        let request = GenerationRequest::new(
            Purpose::QueryGeneration,
            prompts::query_writer(&state.topic, wanted),
        );

        let candidates = match self.toolkit.generate(request, scope).await {
            CallOutcome::Completed(text) => match QueryList::parse(&text) {
                Ok(parsed) => parsed.value.queries,
                Err(err) => {
                    debug!(error = %err, "No queries in generator output");
                    Vec::new()
                }
            },
            CallOutcome::Cancelled => {
                state.cancelled = true;
                Vec::new()
            }
            _ => Vec::new(),
        };

        let mut queries = state.ledger.fresh(candidates);
        queries.truncate(wanted);
        if queries.is_empty() {
            queries.push(state.topic.trim().to_string());
        }

        if !state.cancelled {
            self.toolkit.emit(
                scope,
                ProgressKind::QueriesGenerated {
                    queries: queries.clone(),
                },
            );
        }
        state.pending = queries.into();
        state
    }

    /// Gather evidence for the pending queries.
    ///
    /// The knowledge base is consulted once, with the topic, when it applies
    /// to the request. Knowledge-base evidence replaces the web pass; an
    /// empty result falls through to the web when fallback is enabled.
    pub async fn retrieve(&self, mut state: ResearchState, scope: &RequestScope) -> ResearchState {
        if !state.rag_consulted && self.toolkit.rag_applies(&state.resources) {
            state.rag_consulted = true;
            let topic = state.topic.clone();
            let evidence = match self.toolkit.query_rag(&topic, &state.resources, scope).await {
                CallOutcome::Completed(evidence) => evidence,
                CallOutcome::Cancelled => {
                    state.cancelled = true;
                    return state;
                }
                _ => Vec::new(),
            };

            self.toolkit.emit(
                scope,
                ProgressKind::EvidenceRetrieved {
                    origin: EvidenceOrigin::Rag,
                    query: topic,
                    count: evidence.len(),
                },
            );

            if !evidence.is_empty() {
                info!(count = evidence.len(), "Knowledge base answered the topic");
                state.evidence.extend(evidence);
                state.pending.clear();
                return state;
            }
            if !self.toolkit.config.rag.enable_fallback {
                info!("Knowledge base returned nothing and web fallback is disabled");
                state.pending.clear();
                return state;
            }
            info!("Knowledge base returned nothing, falling back to web search");
        }

        let max_results = self.toolkit.config.web_max_results;
        while let Some(query) = state.pending.pop_front() {
            if !state.ledger.issue(&query) {
                debug!(query = %query, "Skipping already issued query");
                continue;
            }
            match self.toolkit.search_web(&query, max_results, scope).await {
                CallOutcome::Completed(results) => {
                    let count = results.len();
                    state.evidence.extend(
                        results
                            .into_iter()
                            .enumerate()
                            .map(|(rank, r)| r.into_evidence(rank)),
                    );
                    self.toolkit.emit(
                        scope,
                        ProgressKind::EvidenceRetrieved {
                            origin: EvidenceOrigin::Web,
                            query,
                            count,
                        },
                    );
                }
                CallOutcome::Cancelled => {
                    state.cancelled = true;
                    return state;
                }
                _ => {}
            }
        }
        state
    }

    /// Judge the evidence and count the round.
    pub async fn reflect(
        &self,
        mut state: ResearchState,
        scope: &RequestScope,
    ) -> (ResearchState, LoopDecision) {
        let summaries = label_evidence(&state.evidence);
        let request = GenerationRequest::new(
            Purpose::Reflection,
            prompts::reflection(&state.topic, &summaries),
        );

        let verdict = match self.toolkit.generate(request, scope).await {
            CallOutcome::Completed(text) => match ReflectionVerdict::parse(&text) {
                Ok(parsed) => parsed.value,
                Err(err) => {
                    debug!(error = %err, "Unreadable reflection, treating as sufficient");
                    ReflectionVerdict::neutral()
                }
            },
            CallOutcome::Cancelled => {
                state.cancelled = true;
                ReflectionVerdict::neutral()
            }
            _ => ReflectionVerdict::neutral(),
        };

        let decision = state.governor.record_and_decide(verdict.is_sufficient);
        if decision == LoopDecision::Stop(StopCause::CeilingReached) {
            info!(
                ceiling = state.governor.ceiling(),
                "Research loop ceiling reached"
            );
        }
        if !state.cancelled {
            self.toolkit.emit(
                scope,
                ProgressKind::Reflected {
                    loop_count: state.governor.count(),
                    is_sufficient: verdict.is_sufficient,
                    follow_ups: verdict.follow_up_queries.len(),
                },
            );
        }
        state.last_verdict = Some(verdict);
        (state, decision)
    }

    /// Queue the next follow-up nobody has issued yet. Returns `false` when
    /// there is none, which ends the loop as if the verdict were sufficient.
    pub fn continue_research(&self, mut state: ResearchState) -> (ResearchState, bool) {
        let follow_ups = state
            .last_verdict
            .as_ref()
            .map(|v| v.follow_up_queries.as_slice())
            .unwrap_or_default();
        match state.ledger.fresh(follow_ups).into_iter().next() {
            Some(query) => {
                debug!(query = %query, "Continuing with follow-up");
                state.pending.push_back(query);
                (state, true)
            }
            None => {
                debug!("No unissued follow-up left");
                (state, false)
            }
        }
    }

    /// Synthesize the answer from all labeled evidence.
    pub async fn finalize(&self, state: ResearchState, scope: &RequestScope) -> ResearchAnswer {
        let digest = label_evidence(&state.evidence);
        let mut cancelled = state.cancelled || scope.is_cancelled();

        let (text, degraded) = if cancelled {
            (digest, true)
        } else {
            let request = GenerationRequest::new(
                Purpose::Answer,
                prompts::answer(&state.topic, &digest),
            )
            .with_max_tokens(self.toolkit.config.max_tokens);

            match self.toolkit.generate(request, scope).await {
                CallOutcome::Completed(text) if !text.trim().is_empty() => (text, false),
                CallOutcome::Completed(_) => (answer_placeholder("empty response", &digest), true),
                CallOutcome::Failed(err) => (answer_placeholder(&err.to_string(), &digest), true),
                CallOutcome::TimedOut(limit) => (
                    answer_placeholder(&format!("timed out after {}s", limit.as_secs()), &digest),
                    true,
                ),
                CallOutcome::Cancelled => {
                    cancelled = true;
                    (digest, true)
                }
            }
        };

        let sources = state.sources();
        if cancelled {
            warn!("Research cancelled, returning evidence digest");
            self.toolkit.emit(
                scope,
                ProgressKind::Cancelled {
                    stage: "research".to_string(),
                },
            );
        } else {
            self.toolkit.emit(
                scope,
                ProgressKind::AnswerFinalized {
                    sources: sources.len(),
                },
            );
        }

        ResearchAnswer {
            text,
            loops: state.loop_count(),
            queries: state.ledger.issued().to_vec(),
            sources,
            evidence_count: state.evidence.len(),
            cancelled,
            degraded,
        }
    }
}

fn answer_placeholder(reason: &str, digest: &str) -> String {
    format!(
        "*[The answer could not be synthesized: {}. The gathered research follows.]*\n\n{}",
        reason, digest
    )
}
