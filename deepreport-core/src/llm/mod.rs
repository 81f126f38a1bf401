//! LLM client abstraction.
//!
//! One trait, two wire formats: Anthropic's messages API and the
//! OpenAI-compatible chat completions API shared by OpenAI, DeepSeek, Qwen,
//! Zhipu and self-hosted gateways.
//!
//! ## Example
//!
//! ```rust,ignore
//! use deepreport_core::llm::{CompletionRequest, ProviderConfig};
//!
//! let client = ProviderConfig::from_env()?.build()?;
//! let request = CompletionRequest::prompt("Summarize the state of solid-state batteries")
//!     .with_system("Answer in three sentences.");
//!
//! let response = client.complete(request).await?;
//! ```

mod client;
mod provider;
mod types;

pub use client::{AnthropicClient, LLMClient, OpenAIClient};
pub(crate) use client::build_http_client;
pub use provider::ProviderConfig;
pub use types::{
    ChatMessage, ChatRole, CompletionRequest, CompletionResponse, Finish, Provider, TokenUsage,
};
