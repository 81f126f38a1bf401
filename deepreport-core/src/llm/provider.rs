//! Provider selection from environment credentials.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::client::{AnthropicClient, LLMClient, OpenAIClient};
use super::types::Provider;

/// Which provider to talk to, with what credentials and model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            model: provider.default_model().to_string(),
            timeout_secs: 120,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Pick the first provider whose credentials are present.
    ///
    /// Order: DeepSeek, Zhipu, Qwen, OpenAI, Anthropic, then a custom
    /// OpenAI-compatible endpoint (`LLM_API_KEY` + `LLM_BASE_URL`).
    /// `LLM_MODEL_NAME` overrides the model in every case.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = if let Some(key) = get("DEEPSEEK_API_KEY") {
            let config = Self::new(Provider::DeepSeek, key);
            match get("DEEPSEEK_BASE_URL") {
                Some(url) => config.with_base_url(url),
                None => config,
            }
        } else if let Some(key) = get("ZHIPUAI_API_KEY") {
            Self::new(Provider::Zhipu, key)
        } else if let Some(key) = get("QWEN_API_KEY") {
            Self::new(Provider::Qwen, key)
        } else if let Some(key) = get("OPENAI_API_KEY") {
            Self::new(Provider::OpenAI, key)
        } else if let Some(key) = get("ANTHROPIC_API_KEY") {
            Self::new(Provider::Anthropic, key)
        } else if let (Some(key), Some(url)) = (get("LLM_API_KEY"), get("LLM_BASE_URL")) {
            Self::new(Provider::Custom, key).with_base_url(url)
        } else {
            return Err(Error::config(
                "no LLM credentials found; set one of DEEPSEEK_API_KEY, ZHIPUAI_API_KEY, \
                 QWEN_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY or LLM_API_KEY with LLM_BASE_URL",
            ));
        };

        if let Some(model) = get("LLM_MODEL_NAME") {
            config.model = model;
        }
        Ok(config)
    }

    /// Construct the client for this provider.
    pub fn build(&self) -> Result<Arc<dyn LLMClient>> {
        let client: Arc<dyn LLMClient> = if self.provider.speaks_openai() {
            Arc::new(OpenAIClient::new(self)?)
        } else {
            Arc::new(AnthropicClient::new(self)?)
        };
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_priority_order() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-openai"),
            ("QWEN_API_KEY", "sk-qwen"),
        ]))
        .unwrap();
        assert_eq!(config.provider, Provider::Qwen);
        assert_eq!(config.model, "qwen-turbo");
    }

    #[test]
    fn test_custom_endpoint_and_model_override() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-custom"),
            ("LLM_BASE_URL", "https://gateway.local/v1"),
            ("LLM_MODEL_NAME", "llama-3-70b"),
        ]))
        .unwrap();
        assert_eq!(config.provider, Provider::Custom);
        assert_eq!(config.base_url.as_deref(), Some("https://gateway.local/v1"));
        assert_eq!(config.model, "llama-3-70b");
        assert_eq!(config.build().unwrap().provider(), Provider::Custom);
    }

    #[test]
    fn test_custom_key_without_url_is_missing() {
        let result = ProviderConfig::from_lookup(lookup(&[("LLM_API_KEY", "sk-custom")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_key_ignored() {
        let config = ProviderConfig::from_lookup(lookup(&[
            ("DEEPSEEK_API_KEY", "  "),
            ("ANTHROPIC_API_KEY", "sk-ant"),
        ]))
        .unwrap();
        assert_eq!(config.provider, Provider::Anthropic);
    }
}
