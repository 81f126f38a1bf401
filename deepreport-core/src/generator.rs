//! Text generator seam used by every pipeline step.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::llm::{CompletionRequest, LLMClient};

/// What a generation call is for. Lets adapters pick models or
/// temperatures per step and lets tests script responses per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    QueryGeneration,
    Reflection,
    Answer,
    Planning,
    SectionQueries,
    SectionReflection,
    SectionDraft,
}

impl Purpose {
    /// Sampling temperature for the step.
    pub fn temperature(&self) -> f64 {
        match self {
            Self::QueryGeneration => 1.0,
            Self::Reflection | Self::SectionReflection | Self::Answer => 0.0,
            Self::SectionQueries => 0.8,
            Self::Planning | Self::SectionDraft => 0.7,
        }
    }
}

impl std::fmt::Display for Purpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueryGeneration => write!(f, "query_generation"),
            Self::Reflection => write!(f, "reflection"),
            Self::Answer => write!(f, "answer"),
            Self::Planning => write!(f, "planning"),
            Self::SectionQueries => write!(f, "section_queries"),
            Self::SectionReflection => write!(f, "section_reflection"),
            Self::SectionDraft => write!(f, "section_draft"),
        }
    }
}

/// A single prompt for the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub purpose: Purpose,
    pub prompt: String,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    pub fn new(purpose: Purpose, prompt: impl Into<String>) -> Self {
        Self {
            purpose,
            prompt: prompt.into(),
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Produces text for a prompt. May fail or be slow; callers bound it.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn invoke(&self, request: GenerationRequest) -> Result<String>;
}

/// [`Generator`] backed by an [`LLMClient`].
pub struct LlmGenerator {
    client: Arc<dyn LLMClient>,
    model: Option<String>,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            client,
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn invoke(&self, request: GenerationRequest) -> Result<String> {
        let mut completion = CompletionRequest::prompt(request.prompt)
            .with_temperature(request.purpose.temperature());
        if let Some(max_tokens) = request.max_tokens {
            completion = completion.with_max_tokens(max_tokens);
        }
        if let Some(model) = &self.model {
            completion = completion.with_model(model.clone());
        }

        let response = self.client.complete(completion).await?;
        debug!(
            purpose = %request.purpose,
            provider = %self.client.provider(),
            output_tokens = response.usage.output_tokens,
            truncated = response.is_truncated(),
            "Generation completed"
        );
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionResponse, Provider};
    use std::sync::Mutex;

    struct EchoClient {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LLMClient for EchoClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            let content = request.messages[0].content.to_uppercase();
            self.seen.lock().unwrap().push(request);
            Ok(CompletionResponse::new("echo", content))
        }

        fn provider(&self) -> Provider {
            Provider::Custom
        }
    }

    #[tokio::test]
    async fn test_llm_generator_maps_request() {
        let client = Arc::new(EchoClient {
            seen: Mutex::new(Vec::new()),
        });
        let generator = LlmGenerator::new(client.clone()).with_model("echo-large");

        let text = generator
            .invoke(GenerationRequest::new(Purpose::Reflection, "gap?").with_max_tokens(256))
            .await
            .unwrap();
        assert_eq!(text, "GAP?");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].max_tokens, Some(256));
        assert_eq!(seen[0].temperature, Some(0.0));
        assert_eq!(seen[0].model.as_deref(), Some("echo-large"));
    }
}
