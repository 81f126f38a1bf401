//! Provider-neutral request and response shapes.

use serde::{Deserialize, Serialize};

/// Chat model vendor. Everything except Anthropic speaks the
/// OpenAI chat-completions dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Anthropic,
    OpenAI,
    DeepSeek,
    Zhipu,
    Qwen,
    /// Self-hosted or unlisted OpenAI-compatible gateway
    Custom,
}

impl Provider {
    /// API root including the version segment, if the vendor has a fixed one.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("https://api.anthropic.com"),
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::DeepSeek => Some("https://api.deepseek.com/v1"),
            Self::Zhipu => Some("https://open.bigmodel.cn/api/paas/v4"),
            Self::Qwen => Some("https://dashscope.aliyuncs.com/compatible-mode/v1"),
            Self::Custom => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-5-sonnet-20241022",
            Self::OpenAI => "gpt-4o",
            Self::DeepSeek => "deepseek-chat",
            Self::Zhipu => "glm-4",
            Self::Qwen => "qwen-turbo",
            Self::Custom => "custom-model",
        }
    }

    pub fn speaks_openai(&self) -> bool {
        !matches!(self, Self::Anthropic)
    }

    /// Guess the vendor from a model name.
    pub fn for_model(model: &str) -> Self {
        const PREFIXES: &[(&str, Provider)] = &[
            ("deepseek", Provider::DeepSeek),
            ("glm", Provider::Zhipu),
            ("qwen", Provider::Qwen),
            ("claude", Provider::Anthropic),
            ("gpt", Provider::OpenAI),
            ("o1", Provider::OpenAI),
        ];
        let model = model.to_lowercase();
        PREFIXES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, provider)| *provider)
            .unwrap_or(Self::Custom)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAI => "openai",
            Self::DeepSeek => "deepseek",
            Self::Zhipu => "zhipu",
            Self::Qwen => "qwen",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub(crate) fn wire_name(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }
}

/// One completion call. Unset fields fall back to the client's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: Option<String>,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    /// Clamped to `0.0..=1.0`
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-turn request carrying one user prompt.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new().with_message(ChatMessage::user(text))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    /// System prompt plus any system-role messages, joined by blank lines.
    pub(crate) fn merged_system(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .system
            .iter()
            .map(String::as_str)
            .chain(
                self.messages
                    .iter()
                    .filter(|m| m.role == ChatRole::System)
                    .map(|m| m.content.as_str()),
            )
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Whether the model finished on its own or ran into the token limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finish {
    #[default]
    Complete,
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub model: String,
    pub content: String,
    pub finish: Finish,
    pub usage: TokenUsage,
}

impl CompletionResponse {
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: content.into(),
            finish: Finish::Complete,
            usage: TokenUsage::default(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.finish == Finish::Truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_clamps_temperature() {
        let req = CompletionRequest::prompt("Hi")
            .with_model("deepseek-chat")
            .with_max_tokens(1000)
            .with_temperature(1.7);

        assert_eq!(req.model.as_deref(), Some("deepseek-chat"));
        assert_eq!(req.messages, vec![ChatMessage::user("Hi")]);
        assert_eq!(req.max_tokens, Some(1000));
        assert_eq!(req.temperature, Some(1.0));
    }

    #[test]
    fn test_merged_system() {
        assert_eq!(CompletionRequest::prompt("q").merged_system(), None);

        let req = CompletionRequest::new()
            .with_system("Be brief.")
            .with_message(ChatMessage::system("Cite sources."))
            .with_message(ChatMessage::user("q"));
        assert_eq!(
            req.merged_system().as_deref(),
            Some("Be brief.\n\nCite sources.")
        );
    }

    #[test]
    fn test_provider_for_model() {
        assert_eq!(Provider::for_model("deepseek-chat"), Provider::DeepSeek);
        assert_eq!(Provider::for_model("GLM-4"), Provider::Zhipu);
        assert_eq!(Provider::for_model("qwen-turbo"), Provider::Qwen);
        assert_eq!(Provider::for_model("claude-3-5-haiku"), Provider::Anthropic);
        assert_eq!(Provider::for_model("gpt-4o-mini"), Provider::OpenAI);
        assert_eq!(Provider::for_model("llama-3-70b"), Provider::Custom);
        assert_eq!(Provider::Custom.default_base_url(), None);
        assert!(!Provider::Anthropic.speaks_openai());
    }
}
