//! The orchestration engine.
//!
//! One `chat` call drives the full loop: append the user message, pick this
//! turn's tool set, call the model, execute any requested tools, feed the
//! results back, and repeat until the model answers in plain text or the
//! iteration cap is hit.  The cap is the only backstop against a model that
//! never stops calling tools, so reaching it returns a fixed message rather
//! than an error.

use std::sync::Arc;

use tracing::{debug, info};

use apibridge_plugins::{LlmTool, PluginRegistry, compact_schema};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::executor::{ActionExecutor, AskUser, CallContext};
use crate::llm::backend::ChatBackend;
use crate::llm::fallback::chat_with_fallback;
use crate::llm::types::{Message, ToolCall, ToolResult};
use crate::session::ConversationManager;

/// Returned when the iteration cap is reached without a plain-text answer.
pub const STUCK_MESSAGE: &str = "I wasn't able to finish this request within the allowed number \
     of tool-calling steps. Please try again with a simpler request, or break it into smaller \
     parts.";

/// Per-call hooks: the user-confirmation channel and telemetry observers.
#[derive(Default, Clone)]
pub struct ChatOptions {
    /// Channel for confirm-flagged actions to ask the end user.
    pub ask_user: Option<Arc<dyn AskUser>>,
    /// Invoked for every tool call the model requests.
    pub on_tool_call: Option<Arc<dyn Fn(&ToolCall) + Send + Sync>>,
    /// Invoked for every tool result fed back to the model.
    pub on_tool_result: Option<Arc<dyn Fn(&ToolResult) + Send + Sync>>,
}

/// Drives the model/tool loop over a plugin registry.
pub struct OrchestrationEngine {
    backend: Arc<dyn ChatBackend>,
    registry: Arc<PluginRegistry>,
    sessions: ConversationManager,
    executor: ActionExecutor,
    config: EngineConfig,
}

impl OrchestrationEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        registry: Arc<PluginRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            sessions: ConversationManager::with_capacity(config.max_sessions),
            executor: ActionExecutor::new(Arc::clone(&registry)),
            registry,
            config,
        }
    }

    /// The session store, for callers that manage sessions directly.
    pub fn sessions(&self) -> &ConversationManager {
        &self.sessions
    }

    /// Allocate a session seeded with the system prompt built from the
    /// current plugin roster.
    pub async fn create_session(&self) -> Result<String> {
        let id = self.sessions.create().await;
        let roster = self.registry.roster().await;
        self.sessions
            .add_message(&id, Message::system(build_system_prompt(&roster)))
            .await?;
        info!(session = %id, "created session");
        Ok(id)
    }

    /// Run one user turn to completion.
    ///
    /// # Errors
    ///
    /// Fails on unknown sessions and on provider errors the fallback ladder
    /// could not absorb (auth, quota, transport).  Tool failures never error;
    /// they are fed back to the model as failed results.
    pub async fn chat(
        &self,
        session_id: &str,
        user_message: &str,
        options: &ChatOptions,
    ) -> Result<String> {
        self.sessions
            .add_message(session_id, Message::user(user_message))
            .await?;

        let tools = self.turn_tools(user_message).await;
        debug!(session = %session_id, tools = tools.len(), "starting chat turn");

        let call_ctx = CallContext {
            session_id: Some(session_id.to_owned()),
            ask: options.ask_user.clone(),
        };

        for iteration in 0..self.config.max_iterations {
            let messages = self.sessions.messages(session_id).await?;
            let outcome = chat_with_fallback(self.backend.as_ref(), &messages, &tools).await?;

            if outcome.is_final() {
                let text = outcome.text.unwrap_or_default();
                self.sessions
                    .add_message(session_id, Message::assistant(text.clone()))
                    .await?;
                info!(session = %session_id, iterations = iteration + 1, "chat turn complete");
                return Ok(text);
            }

            let tool_calls = outcome.tool_calls;
            self.sessions
                .add_message(
                    session_id,
                    Message::assistant_tool_calls(
                        outcome.text.unwrap_or_default(),
                        tool_calls.clone(),
                    ),
                )
                .await?;

            if let Some(on_tool_call) = &options.on_tool_call {
                for tool_call in &tool_calls {
                    on_tool_call(tool_call);
                }
            }

            let mut results = self.executor.execute_all(&tool_calls, &call_ctx).await;

            // Feed results back in call order, one tool message per call.
            for tool_call in &tool_calls {
                let result = results.remove(&tool_call.id).unwrap_or_else(|| ToolResult {
                    tool_call_id: tool_call.id.clone(),
                    content: "{\"success\":false,\"message\":\"Action failed: no result\"}".into(),
                    is_error: true,
                });
                if let Some(on_tool_result) = &options.on_tool_result {
                    on_tool_result(&result);
                }
                self.sessions
                    .add_message(
                        session_id,
                        Message::tool_result(result.tool_call_id.clone(), result.content),
                    )
                    .await?;
            }
        }

        info!(session = %session_id, cap = self.config.max_iterations, "iteration cap reached");
        self.sessions
            .add_message(session_id, Message::assistant(STUCK_MESSAGE))
            .await?;
        Ok(STUCK_MESSAGE.to_owned())
    }

    /// This turn's tool list: relevance-selected when over the cap,
    /// compacted when configured.
    async fn turn_tools(&self, user_message: &str) -> Vec<LlmTool> {
        let mut tools = self
            .registry
            .select_llm_tools(user_message, self.config.max_tools_per_turn)
            .await;
        if self.config.compact_schemas {
            for tool in &mut tools {
                tool.parameters = compact_schema(&tool.parameters);
            }
        }
        tools
    }
}

fn build_system_prompt(roster: &str) -> String {
    format!(
        "You are a helpful assistant that can operate connected services through tools.\n\n\
         Connected plugins:\n{roster}\n\n\
         Rules:\n\
         - Only report an action as done or data as retrieved when a tool call in this \
         conversation actually succeeded. Never claim success for a call that failed or that \
         you did not make.\n\
         - When a tool call fails, tell the user plainly what failed.\n\
         - Ask for clarification instead of guessing missing required details."
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
