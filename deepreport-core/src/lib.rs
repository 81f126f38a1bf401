//! # deepreport-core
//!
//! A research agent that answers questions from web and knowledge-base
//! evidence, and writes long structured reports section by section.
//!
//! ## Core Components
//!
//! - **Classifier**: routes a request to standard mode or long-report mode
//! - **Research**: the bounded query / retrieve / reflect loop of standard mode
//! - **Report**: planner, section processor and compiler of long-report mode
//! - **Governor**: iteration ceilings every loop is held to
//! - **Events**: progress events for observers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use deepreport_core::{BroadcastSink, Conversation, RequestScope, ResearchAgent};
//!
//! let sink = Arc::new(BroadcastSink::new(64));
//! let mut events = sink.subscribe();
//! let agent = ResearchAgent::from_env()?.with_sink(sink);
//!
//! let conversation = Conversation::from_user("Write a 5000 words research report on tidal power");
//! let output = agent.run(&conversation, Vec::new(), &RequestScope::new()).await?;
//! println!("{}", output.text());
//! ```

pub mod agent;
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod generator;
pub mod governor;
pub mod guard;
pub mod llm;
pub mod parse;
pub mod prompts;
pub mod queries;
pub mod report;
pub mod research;
pub mod retrieval;
pub mod runtime;
pub mod text;

mod properties;
#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use agent::{AgentOutput, ResearchAgent};
pub use classifier::{extract_word_count, RequestClassifier, RequestDecision, ResearchMode};
pub use config::{default_outline, OutlineEntry, RagSettings, ResearchConfig};
pub use context::{Conversation, Message, Role};
pub use error::{Error, Result};
pub use events::{
    BroadcastSink, CollectingSink, NullSink, ProgressEvent, ProgressKind, ProgressSink,
    SectionProgress,
};
pub use generator::{GenerationRequest, Generator, LlmGenerator, Purpose};
pub use governor::{IterationGovernor, LoopDecision, LoopKind, StopCause};
pub use guard::{bounded_call, CallOutcome};
pub use llm::{
    AnthropicClient, CompletionRequest, CompletionResponse, LLMClient, OpenAIClient, Provider,
    ProviderConfig,
};
pub use parse::{DualParse, ParseError, ParseStrategy, Parsed, PlanDraft, QueryList, ReflectionVerdict};
pub use queries::QueryLedger;
pub use report::{
    compile, CompletedSection, CompletedSections, FinalReport, ProgressState, ReportPlan,
    ReportPlanner, ReportSession, ReportWriter, Section, SectionCursor, SectionOutcome,
    SectionProcessor, SectionStep,
};
pub use research::{ResearchAnswer, ResearchController, ResearchState};
pub use retrieval::{
    web_retriever_from_env, Evidence, EvidenceOrigin, GoogleSearch, RagFlowConfig,
    RagFlowRetriever, RagRetriever, Resource, SearchEngine, SerperSearch, Source,
    TavilySearch, WebResult, WebRetriever,
};
pub use runtime::{RequestScope, Toolkit};
