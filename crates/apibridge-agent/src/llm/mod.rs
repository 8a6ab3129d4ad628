//! LLM provider adapters.
//!
//! [`types`] defines the uniform message shapes, [`backend`] the provider
//! seam and normalized errors, [`anthropic`]/[`openai`] the two wire
//! implementations, and [`fallback`] the tool-set degradation ladder.

pub mod anthropic;
pub mod backend;
pub mod fallback;
pub mod openai;
pub mod types;

pub use anthropic::AnthropicBackend;
pub use backend::{BackendConfig, BackendError, BackendKind, ChatBackend, ErrorClass};
pub use fallback::chat_with_fallback;
pub use openai::OpenAiBackend;
pub use types::{ChatOutcome, Message, Role, ToolCall, ToolResult};
