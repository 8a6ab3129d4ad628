//! Agent error types.

use apibridge_plugins::PluginError;

use crate::llm::backend::BackendError;

/// Errors raised by the conversation engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A provider call failed after the fallback ladder was exhausted.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A backend was configured without an API key.
    #[error("missing API key for backend `{backend}`")]
    MissingApiKey { backend: String },

    /// A session id does not exist (never created, or already evicted).
    #[error("unknown session: {id}")]
    UnknownSession { id: String },

    /// A registry or compiler error bubbled up during orchestration.
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;
