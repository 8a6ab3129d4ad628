//! Conversation engine.
//!
//! Ties the compiled plugins to an LLM backend:
//!
//! - [`llm`] — uniform message types, provider backends (Anthropic, OpenAI
//!   and compatible), and the tool-set fallback ladder.
//! - [`session`] — bounded in-memory session store with oldest-insertion
//!   eviction.
//! - [`executor`] — schema-validated, concurrent tool-call execution.
//! - [`engine`] — the bounded model/tool loop.

pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod llm;
pub mod session;

pub use config::EngineConfig;
pub use engine::{ChatOptions, OrchestrationEngine, STUCK_MESSAGE};
pub use error::{AgentError, Result};
pub use executor::{ActionExecutor, AskUser, CallContext};
pub use llm::{
    AnthropicBackend, BackendConfig, BackendError, BackendKind, ChatBackend, ChatOutcome, Message,
    OpenAiBackend, Role, ToolCall, ToolResult,
};
pub use session::{ConversationManager, Session};
