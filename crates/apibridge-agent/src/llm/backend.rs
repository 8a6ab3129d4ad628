//! The chat backend seam.
//!
//! The engine talks to providers through [`ChatBackend`]: one round-trip in,
//! one [`ChatOutcome`] out.  Backend failures are normalized into
//! [`BackendError`], which carries the HTTP status when known and classifies
//! the failure so the fallback ladder can decide whether retrying with a
//! smaller tool set is worthwhile.

use async_trait::async_trait;

use apibridge_plugins::LlmTool;

use crate::llm::types::{ChatOutcome, Message};

/// Which wire protocol a configured endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI Chat Completions API.
    OpenAi,
    /// An OpenAI-compatible endpoint (Ollama, Together, vLLM, ...).
    OpenAiCompatible,
}

impl BackendKind {
    /// Infer the backend identity from its configured endpoint.
    pub fn from_endpoint(endpoint: &str) -> Self {
        if endpoint.contains("anthropic.com") {
            Self::Anthropic
        } else if endpoint.contains("api.openai.com") {
            Self::OpenAi
        } else {
            Self::OpenAiCompatible
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai-compatible",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a single provider endpoint.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL for the API.
    pub endpoint: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per response.
    pub max_tokens: u32,
    /// Sampling temperature, if overridden.
    pub temperature: Option<f32>,
}

impl BackendConfig {
    /// Configuration for the Anthropic Messages API.
    pub fn anthropic(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: "https://api.anthropic.com".into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    /// Configuration for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    /// Configuration for any OpenAI-compatible endpoint.
    pub fn openai_compatible(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }

    /// The backend identity inferred from the endpoint.
    pub fn kind(&self) -> BackendKind {
        BackendKind::from_endpoint(&self.endpoint)
    }
}

// ---------------------------------------------------------------------------
// Normalized errors
// ---------------------------------------------------------------------------

/// Coarse failure class, used to pick a fallback strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Authentication or authorization failure.  Never retried.
    Auth,
    /// Rate limit or exhausted quota.  Never retried.
    Quota,
    /// Request-too-large or malformed-function-call class rejection.
    /// Worth retrying with a smaller tool set.
    SizeOrFormat,
    /// Anything else: transport failures, server errors, parse failures.
    Other,
}

/// A provider failure, normalized across backends.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} request failed{}: {message}{}", .kind, status_suffix(.status), advice_suffix(.kind, .status))]
pub struct BackendError {
    /// The backend that produced the failure.
    pub kind: BackendKind,
    /// HTTP status, when the failure came from an HTTP response.
    pub status: Option<u16>,
    /// The provider's own message (or the transport error text).
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

fn advice_suffix(kind: &BackendKind, status: &Option<u16>) -> String {
    let advice = match (status, kind) {
        (Some(401) | Some(403), _) => "check the configured API key",
        (Some(429), _) => "rate limit or quota exhausted; retry later or check your plan",
        (Some(402), _) => "billing or quota problem on the provider account",
        (Some(404), BackendKind::OpenAiCompatible) => {
            "verify the endpoint URL and that it serves the configured model"
        }
        (Some(404), _) => "verify the configured model name",
        _ => return String::new(),
    };
    format!(" — {advice}")
}

impl BackendError {
    /// Build an error from an HTTP rejection.
    pub fn http(kind: BackendKind, status: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Build an error with no HTTP status (transport or parse failure).
    pub fn other(kind: BackendKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Classify this failure for the fallback ladder.
    pub fn class(&self) -> ErrorClass {
        match self.status {
            Some(401) | Some(403) => ErrorClass::Auth,
            Some(402) | Some(429) => ErrorClass::Quota,
            Some(413) => ErrorClass::SizeOrFormat,
            _ => {
                let lower = self.message.to_lowercase();
                if lower.contains("too large")
                    || lower.contains("too long")
                    || lower.contains("context length")
                    || lower.contains("context_length")
                    || lower.contains("malformed function call")
                    || lower.contains("invalid tool")
                    || lower.contains("tool_use")
                {
                    ErrorClass::SizeOrFormat
                } else {
                    ErrorClass::Other
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// The backend trait
// ---------------------------------------------------------------------------

/// One provider round-trip: full message history plus this turn's tool set
/// in, text and/or tool calls out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the conversation and return the model's next move.
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[LlmTool],
    ) -> std::result::Result<ChatOutcome, BackendError>;

    /// Stable backend name, for logging.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_inferred_from_endpoint() {
        assert_eq!(
            BackendKind::from_endpoint("https://api.anthropic.com"),
            BackendKind::Anthropic
        );
        assert_eq!(
            BackendKind::from_endpoint("https://api.openai.com/v1"),
            BackendKind::OpenAi
        );
        assert_eq!(
            BackendKind::from_endpoint("http://localhost:11434/v1"),
            BackendKind::OpenAiCompatible
        );
    }

    #[test]
    fn status_drives_classification() {
        let auth = BackendError::http(BackendKind::OpenAi, 401, "bad key");
        assert_eq!(auth.class(), ErrorClass::Auth);

        let quota = BackendError::http(BackendKind::Anthropic, 429, "rate limited");
        assert_eq!(quota.class(), ErrorClass::Quota);

        let size = BackendError::http(BackendKind::OpenAi, 413, "payload too large");
        assert_eq!(size.class(), ErrorClass::SizeOrFormat);
    }

    #[test]
    fn message_drives_classification_without_status() {
        let err = BackendError::http(
            BackendKind::Anthropic,
            400,
            "prompt is too long: context length exceeded",
        );
        assert_eq!(err.class(), ErrorClass::SizeOrFormat);

        let other = BackendError::other(BackendKind::OpenAi, "connection reset");
        assert_eq!(other.class(), ErrorClass::Other);
    }

    #[test]
    fn display_carries_status_and_advice() {
        let err = BackendError::http(BackendKind::OpenAi, 401, "invalid api key");
        let text = err.to_string();
        assert!(text.contains("status 401"));
        assert!(text.contains("API key"));
    }
}
