//! HTTP chat clients.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::provider::ProviderConfig;
use super::types::{ChatRole, CompletionRequest, CompletionResponse, Finish, Provider, TokenUsage};

/// A chat model behind some API.
#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    fn provider(&self) -> Provider;
}

/// reqwest client shared by the LLM and retrieval adapters.
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);

    // Proxy auto-detection can panic in some sandboxes; retry without it.
    let detected = catch_unwind(AssertUnwindSafe(|| Client::builder().timeout(timeout).build()));
    if let Ok(Ok(client)) = detected {
        return Ok(client);
    }
    Client::builder()
        .no_proxy()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("cannot build HTTP client: {}", e)))
}

/// Resolved connection details for one provider.
struct Endpoint {
    provider: Provider,
    api_key: String,
    base_url: String,
    model: String,
    http: Client,
}

impl Endpoint {
    fn resolve(config: &ProviderConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .or(config.provider.default_base_url())
            .ok_or_else(|| {
                Error::config(format!("{} provider needs a base URL", config.provider))
            })?
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            provider: config.provider,
            api_key: config.api_key.clone(),
            base_url,
            model: config.model.clone(),
            http: build_http_client(config.timeout_secs)?,
        })
    }

    fn model_for(&self, request: &CompletionRequest) -> String {
        request.model.clone().unwrap_or_else(|| self.model.clone())
    }

    /// POST a JSON body and return the raw response text of a 2xx reply.
    async fn post<B: Serialize>(&self, builder: RequestBuilder, body: &B) -> Result<String> {
        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| Error::LLM(format!("{} request failed: {}", self.provider, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::LLM(format!("{} response unreadable: {}", self.provider, e)))?;

        if status.is_success() {
            return Ok(text);
        }
        let message = match serde_json::from_str::<wire::ErrorEnvelope>(&text) {
            Ok(envelope) => envelope.error.describe(),
            Err(_) => format!("{}: {}", status, text),
        };
        Err(Error::llm_api(self.provider.to_string(), message))
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, text: &str) -> Result<T> {
        serde_json::from_str(text)
            .map_err(|e| Error::LLM(format!("{} returned malformed JSON: {}", self.provider, e)))
    }
}

/// Anthropic messages API.
pub struct AnthropicClient {
    endpoint: Endpoint,
}

impl AnthropicClient {
    const API_VERSION: &'static str = "2023-06-01";
    const MAX_TOKENS: u32 = 4096;

    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::resolve(config)?,
        })
    }
}

#[async_trait]
impl LLMClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let ep = &self.endpoint;
        let body = wire::AnthropicBody {
            model: ep.model_for(&request),
            system: request.merged_system(),
            messages: request
                .messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .map(wire::Turn::from)
                .collect(),
            max_tokens: request.max_tokens.unwrap_or(Self::MAX_TOKENS),
            temperature: request.temperature,
        };

        let builder = ep
            .http
            .post(format!("{}/v1/messages", ep.base_url))
            .header("x-api-key", &ep.api_key)
            .header("anthropic-version", Self::API_VERSION);
        let text = ep.post(builder, &body).await?;
        let reply: wire::AnthropicReply = ep.decode(&text)?;

        debug!(model = %reply.model, stop = ?reply.stop_reason, "Anthropic completion");
        let finish = match reply.stop_reason.as_deref() {
            Some("max_tokens") => Finish::Truncated,
            _ => Finish::Complete,
        };
        Ok(CompletionResponse {
            content: reply.content.into_iter().filter_map(|b| b.text).collect(),
            model: reply.model,
            finish,
            usage: TokenUsage {
                input_tokens: reply.usage.input_tokens,
                output_tokens: reply.usage.output_tokens,
            },
        })
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }
}

/// OpenAI chat completions, and every vendor that copies its dialect.
pub struct OpenAIClient {
    endpoint: Endpoint,
}

impl OpenAIClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        if !config.provider.speaks_openai() {
            return Err(Error::config(format!(
                "{} does not speak the OpenAI chat dialect",
                config.provider
            )));
        }
        Ok(Self {
            endpoint: Endpoint::resolve(config)?,
        })
    }

    #[cfg(test)]
    fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let ep = &self.endpoint;
        let system = request.merged_system().map(|content| wire::Turn {
            role: ChatRole::System.wire_name(),
            content,
        });
        let body = wire::OpenAIBody {
            model: ep.model_for(&request),
            messages: system
                .into_iter()
                .chain(
                    request
                        .messages
                        .iter()
                        .filter(|m| m.role != ChatRole::System)
                        .map(wire::Turn::from),
                )
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let builder = ep
            .http
            .post(format!("{}/chat/completions", ep.base_url))
            .bearer_auth(&ep.api_key);
        let text = ep.post(builder, &body).await?;
        let reply: wire::OpenAIReply = ep.decode(&text)?;

        let choice = reply.choices.into_iter().next().ok_or_else(|| {
            Error::llm_api(ep.provider.to_string(), "response carried no choices")
        })?;
        let finish = match choice.finish_reason.as_deref() {
            Some("length") => Finish::Truncated,
            _ => Finish::Complete,
        };
        let usage = reply
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            model: if reply.model.is_empty() { ep.model_for(&request) } else { reply.model },
            content: choice.message.content.unwrap_or_default(),
            finish,
            usage,
        })
    }

    fn provider(&self) -> Provider {
        self.endpoint.provider
    }
}

/// JSON bodies exchanged with the vendors.
mod wire {
    use serde::{Deserialize, Serialize};

    use crate::llm::types::ChatMessage;

    #[derive(Debug, Serialize)]
    pub struct Turn {
        pub role: &'static str,
        pub content: String,
    }

    impl From<&ChatMessage> for Turn {
        fn from(message: &ChatMessage) -> Self {
            Self {
                role: message.role.wire_name(),
                content: message.content.clone(),
            }
        }
    }

    #[derive(Debug, Serialize)]
    pub struct AnthropicBody {
        pub model: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub system: Option<String>,
        pub messages: Vec<Turn>,
        pub max_tokens: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct AnthropicReply {
        #[serde(default)]
        pub model: String,
        pub content: Vec<ContentBlock>,
        pub stop_reason: Option<String>,
        pub usage: AnthropicUsage,
    }

    /// Non-text blocks carry no `text` and are skipped.
    #[derive(Debug, Deserialize)]
    pub struct ContentBlock {
        pub text: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct AnthropicUsage {
        pub input_tokens: u64,
        pub output_tokens: u64,
    }

    #[derive(Debug, Serialize)]
    pub struct OpenAIBody {
        pub model: String,
        pub messages: Vec<Turn>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub max_tokens: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub temperature: Option<f64>,
    }

    #[derive(Debug, Deserialize)]
    pub struct OpenAIReply {
        #[serde(default)]
        pub model: String,
        pub choices: Vec<Choice>,
        pub usage: Option<OpenAIUsage>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Choice {
        pub message: ChoiceMessage,
        pub finish_reason: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ChoiceMessage {
        pub content: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct OpenAIUsage {
        pub prompt_tokens: u64,
        pub completion_tokens: u64,
    }

    /// Both dialects wrap failures as `{"error": {...}}`.
    #[derive(Debug, Deserialize)]
    pub struct ErrorEnvelope {
        pub error: ErrorBody,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorBody {
        pub message: String,
        #[serde(rename = "type", default)]
        pub kind: Option<String>,
    }

    impl ErrorBody {
        pub fn describe(&self) -> String {
            match &self.kind {
                Some(kind) => format!("{}: {}", kind, self.message),
                None => self.message.clone(),
            }
        }
    }
}
