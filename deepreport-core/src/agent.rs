//! Entry point: classify a conversation and run the matching pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::classifier::{RequestClassifier, RequestDecision, ResearchMode};
use crate::config::ResearchConfig;
use crate::context::Conversation;
use crate::error::Result;
use crate::events::{ProgressKind, ProgressSink};
use crate::generator::LlmGenerator;
use crate::llm::ProviderConfig;
use crate::report::{FinalReport, ReportWriter};
use crate::research::{ResearchAnswer, ResearchController};
use crate::retrieval::{web_retriever_from_env, RagFlowConfig, RagFlowRetriever, Resource};
use crate::runtime::{RequestScope, Toolkit};

/// What a request produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AgentOutput {
    Answer(ResearchAnswer),
    Report(FinalReport),
}

impl AgentOutput {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(answer) => &answer.text,
            Self::Report(report) => &report.text,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Answer(answer) => answer.cancelled,
            Self::Report(report) => report.cancelled,
        }
    }
}

/// Research agent over a [`Toolkit`].
///
/// Requests are independent: the agent holds no per-request state, so one
/// agent can serve any number of concurrent requests.
#[derive(Clone)]
pub struct ResearchAgent {
    toolkit: Toolkit,
    classifier: RequestClassifier,
}

impl ResearchAgent {
    pub fn new(toolkit: Toolkit) -> Self {
        let classifier = RequestClassifier::new(toolkit.config.default_target_words);
        Self {
            toolkit,
            classifier,
        }
    }

    /// Build from environment variables: LLM provider, search engine and,
    /// when enabled, the RAGFlow knowledge base.
    pub fn from_env() -> Result<Self> {
        let config = ResearchConfig::from_env();
        config.validate()?;

        let provider = ProviderConfig::from_env()?;
        let generator = Arc::new(LlmGenerator::new(provider.build()?));
        let web = web_retriever_from_env()?;
        let mut toolkit = Toolkit::new(generator, web, config.clone());

        if config.rag.enabled {
            let rag_config = RagFlowConfig::from_env()?
                .with_limits(config.rag.max_documents, config.rag.similarity_threshold);
            toolkit = toolkit.with_rag(Arc::new(RagFlowRetriever::new(rag_config)?));
        }

        info!(
            provider = %provider.provider,
            search = toolkit.web.name(),
            rag = toolkit.rag.is_some(),
            "Research agent configured"
        );
        Ok(Self::new(toolkit))
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.toolkit = self.toolkit.with_sink(sink);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.toolkit.config
    }

    pub fn classify(&self, conversation: &Conversation) -> RequestDecision {
        self.classifier.classify_conversation(conversation)
    }

    /// Handle one request.
    #[instrument(skip_all, fields(request_id = %scope.id))]
    pub async fn run(
        &self,
        conversation: &Conversation,
        resources: Vec<Resource>,
        scope: &RequestScope,
    ) -> Result<AgentOutput> {
        self.toolkit.config.validate()?;

        let decision = self.classify(conversation);
        let topic = conversation.research_topic();
        info!(
            mode = %decision.mode,
            target_words = decision.target_word_count,
            reason = %decision.reason,
            "Request classified"
        );
        self.toolkit.emit(
            scope,
            ProgressKind::ModeSelected {
                mode: decision.mode,
                target_word_count: decision
                    .is_long_report()
                    .then_some(decision.target_word_count),
            },
        );

        match decision.mode {
            ResearchMode::Standard => Ok(AgentOutput::Answer(
                self.research(&topic, resources, scope).await,
            )),
            ResearchMode::LongReport => self
                .write_report(&topic, decision.target_word_count, resources, scope)
                .await
                .map(AgentOutput::Report),
        }
    }

    /// Standard mode only.
    pub async fn research(
        &self,
        topic: &str,
        resources: Vec<Resource>,
        scope: &RequestScope,
    ) -> ResearchAnswer {
        ResearchController::new(self.toolkit.clone())
            .run(topic, resources, scope)
            .await
    }

    /// Long-report mode only.
    pub async fn write_report(
        &self,
        topic: &str,
        target_words: usize,
        resources: Vec<Resource>,
        scope: &RequestScope,
    ) -> Result<FinalReport> {
        ReportWriter::new(self.toolkit.clone())
            .write(topic, target_words, resources, scope)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlineEntry;
    use crate::error::Error;
    use crate::generator::Purpose;
    use crate::testing::{CallLog, Harness, ScriptedGenerator};
    use pretty_assertions::assert_eq;

    fn scripted(log: &CallLog) -> ScriptedGenerator {
        ScriptedGenerator::new(log.clone())
            .always(Purpose::QueryGeneration, r#"{"query": ["sodium batteries"]}"#)
            .always(
                Purpose::Reflection,
                r#"{"is_sufficient": true, "follow_up_queries": []}"#,
            )
            .always(Purpose::Answer, "Sodium batteries are cheaper.")
            .always(Purpose::Planning, "not json")
            .always(Purpose::SectionQueries, r#"{"queries": ["sodium cost"]}"#)
            .always(
                Purpose::SectionReflection,
                r#"{"is_sufficient": true, "follow_up_queries": []}"#,
            )
            .always(Purpose::SectionDraft, "Body.")
    }

    #[tokio::test]
    async fn test_standard_request_answers() {
        let log = CallLog::default();
        let harness = Harness::new(scripted(&log), log.clone(), ResearchConfig::default());
        let agent = ResearchAgent::new(harness.toolkit.clone());

        let output = agent
            .run(
                &Conversation::from_user("What about sodium batteries?"),
                Vec::new(),
                &RequestScope::new(),
            )
            .await
            .unwrap();

        assert_eq!(output.text(), "Sodium batteries are cheaper.");
        assert_eq!(log.count_prefix("gen:planning"), 0);
        let first = harness.sink.events().into_iter().next().unwrap();
        assert_eq!(
            first.kind,
            ProgressKind::ModeSelected {
                mode: ResearchMode::Standard,
                target_word_count: None,
            }
        );
    }

    #[tokio::test]
    async fn test_long_report_request() {
        let log = CallLog::default();
        let harness = Harness::new(scripted(&log), log.clone(), ResearchConfig::default());
        let agent = ResearchAgent::new(harness.toolkit.clone());

        let output = agent
            .run(
                &Conversation::from_user("请写一篇关于钠电池的研究报告，5千字"),
                Vec::new(),
                &RequestScope::new(),
            )
            .await
            .unwrap();

        let AgentOutput::Report(report) = output else {
            panic!("expected a report");
        };
        assert_eq!(report.section_count, 4);
        assert!(report.is_complete());
        assert_eq!(log.count_prefix("gen:query_generation"), 0);
        assert_eq!(harness.sink.sections().len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_any_call() {
        let log = CallLog::default();
        let config = ResearchConfig::default()
            .with_fallback_outline(vec![OutlineEntry::new("Only", "Everything", true, 50)]);
        let harness = Harness::new(scripted(&log), log.clone(), config);

        let result = ResearchAgent::new(harness.toolkit.clone())
            .run(&Conversation::from_user("hi"), Vec::new(), &RequestScope::new())
            .await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert!(log.entries().is_empty());
    }
}
