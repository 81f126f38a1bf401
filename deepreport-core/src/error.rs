//! Error types for deepreport-core.

use thiserror::Error;

/// Result type alias using deepreport-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while researching or building a report.
#[derive(Error, Debug)]
pub enum Error {
    /// Timeout during an external call
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// LLM API error
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: String, message: String },

    /// LLM error (simple variant)
    #[error("LLM error: {0}")]
    LLM(String),

    /// Knowledge-base or web retrieval error
    #[error("Retrieval error: {provider} - {message}")]
    Retrieval { provider: String, message: String },

    /// The request was cancelled by its caller
    #[error("Request cancelled")]
    Cancelled,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error (bad values, missing credentials)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Compilation was requested before a plan existed
    #[error("No report plan available to compile")]
    MissingPlan,

    /// A section with this name is already in the completed list
    #[error("Section already completed: {name}")]
    DuplicateSection { name: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an LLM API error.
    pub fn llm_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a retrieval error.
    pub fn retrieval(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retrieval {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a duplicate section error.
    pub fn duplicate_section(name: impl Into<String>) -> Self {
        Self::DuplicateSection { name: name.into() }
    }

    /// Whether the error came from a bounded call running out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::retrieval("tavily", "HTTP 502").to_string(),
            "Retrieval error: tavily - HTTP 502"
        );
        assert_eq!(
            Error::timeout(45_000).to_string(),
            "Operation timed out after 45000ms"
        );
        assert_eq!(
            Error::duplicate_section("Introduction").to_string(),
            "Section already completed: Introduction"
        );
    }

    #[test]
    fn test_serde_error_converts() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(!err.is_timeout());
    }
}
