//! Tool-call execution.
//!
//! The executor sits between the model and the compiled actions: it resolves
//! encoded tool names through the registry, validates arguments against the
//! action's schema, gates confirm-flagged actions through the `ask_user`
//! hook, and runs a turn's calls concurrently.  Every failure mode becomes a
//! failed [`ToolResult`] — the model sees it and recovers, the engine never
//! crashes mid-turn.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use jsonschema::{Draft, JSONSchema};
use tracing::{debug, warn};

use apibridge_plugins::{ActionOutcome, PluginRegistry};

use crate::llm::types::{ToolCall, ToolResult};

pub use apibridge_plugins::{AskUser, CallContext};

/// Executes tool calls against the registry.
#[derive(Clone)]
pub struct ActionExecutor {
    registry: Arc<PluginRegistry>,
}

impl ActionExecutor {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Execute one tool call.  Never errors: resolution failures, invalid
    /// arguments, declined confirmations, and execution faults all come back
    /// as failed results.
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &CallContext) -> ToolResult {
        let outcome = self.run(tool_call, ctx).await;
        to_tool_result(&tool_call.id, outcome)
    }

    /// Execute a turn's tool calls concurrently; results are keyed by
    /// [`ToolCall::id`], not ordered.
    pub async fn execute_all(
        &self,
        tool_calls: &[ToolCall],
        ctx: &CallContext,
    ) -> HashMap<String, ToolResult> {
        let handles: Vec<_> = tool_calls
            .iter()
            .map(|tool_call| {
                let executor = self.clone();
                let tool_call = tool_call.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let result = executor.execute(&tool_call, &ctx).await;
                    (tool_call.id, result)
                })
            })
            .collect();

        let mut results = HashMap::with_capacity(handles.len());
        for handle in join_all(handles).await {
            match handle {
                Ok((id, result)) => {
                    results.insert(id, result);
                }
                Err(e) => {
                    // A panicking task must not take the turn down with it.
                    warn!(error = %e, "tool call task failed");
                }
            }
        }

        // Calls whose task never produced a result still need an entry.
        for tool_call in tool_calls {
            results.entry(tool_call.id.clone()).or_insert_with(|| {
                to_tool_result(
                    &tool_call.id,
                    ActionOutcome::failed("Action failed: execution task aborted"),
                )
            });
        }

        results
    }

    async fn run(&self, tool_call: &ToolCall, ctx: &CallContext) -> ActionOutcome {
        let (plugin, action) = match self.registry.resolve(&tool_call.name).await {
            Ok(resolved) => resolved,
            Err(e) => return ActionOutcome::failed(e.to_string()),
        };

        if let Some(reasons) = validate_arguments(action.parameter_schema(), &tool_call.arguments) {
            return ActionOutcome::failed(format!("invalid arguments: {reasons}"));
        }

        if action.confirm() {
            if let Some(ask) = &ctx.ask {
                let question = format!(
                    "Run `{}` on plugin `{}` with arguments {}? (yes/no)",
                    action.id(),
                    plugin.name,
                    tool_call.arguments
                );
                let answer = ask.ask(&question).await;
                let answer = answer.trim().to_lowercase();
                if !(answer.starts_with('y') || answer == "ok") {
                    return ActionOutcome::failed("Action cancelled by user");
                }
            }
        }

        debug!(tool = %tool_call.name, id = %tool_call.id, "executing tool call");
        action.execute_with(tool_call.arguments.clone(), ctx).await
    }
}

/// Validate arguments against a parameter schema.  Returns the joined
/// validation messages on failure, `None` when the arguments conform.
fn validate_arguments(schema: &serde_json::Value, arguments: &serde_json::Value) -> Option<String> {
    let compiled = match JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(schema)
    {
        Ok(compiled) => compiled,
        // A schema we generated ourselves should always compile; if it does
        // not, refuse the call rather than skipping validation.
        Err(e) => return Some(format!("parameter schema failed to compile: {e}")),
    };

    let arguments = if arguments.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        arguments.clone()
    };

    if let Err(errors) = compiled.validate(&arguments) {
        let messages: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Some(messages.join("; "));
    }
    None
}

fn to_tool_result(tool_call_id: &str, outcome: ActionOutcome) -> ToolResult {
    let is_error = !outcome.success;
    let content = serde_json::to_string(&outcome)
        .unwrap_or_else(|_| format!("{{\"success\":{},\"message\":\"\"}}", outcome.success));
    ToolResult {
        tool_call_id: tool_call_id.to_owned(),
        content,
        is_error,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
