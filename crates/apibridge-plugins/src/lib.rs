//! Plugin compilation and registry.
//!
//! This crate turns validated manifests into executable plugins and exposes
//! them as model-facing tools:
//!
//! - [`compiler`] — [`ActionCompiler`] binds a manifest and credentials to an
//!   [`HttpTransport`], producing a [`Plugin`] of [`CompiledAction`]s.
//! - [`registry`] — [`PluginRegistry`] stores plugins, projects tool
//!   definitions, and resolves tool calls back to actions.
//! - [`select`] — relevance ranking for backends that cap tool-list size.
//! - [`hooks`] — opt-in per-API argument enrichment.

pub mod compiler;
pub mod error;
pub mod hooks;
pub mod naming;
pub mod outcome;
pub mod registry;
pub mod schema;
pub mod select;
pub mod summary;
pub mod transport;

pub use compiler::{ActionCompiler, CompiledAction, Plugin};
pub use error::{PluginError, Result};
pub use hooks::{AskUser, CallContext, EnrichmentHook, HookContext, HookTable, MailEnvelopeHook};
pub use naming::{encode_tool_name, parse_tool_name};
pub use outcome::ActionOutcome;
pub use registry::{LlmTool, PluginLifecycle, PluginRegistry};
pub use schema::{compact_schema, parameters_to_schema};
pub use select::{HeuristicRanker, ToolRanker};
pub use summary::summarize_response;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
