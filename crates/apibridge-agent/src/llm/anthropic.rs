//! Anthropic Messages API backend.
//!
//! Non-streaming only: the engine contract is one full outcome per
//! round-trip.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use apibridge_plugins::LlmTool;

use crate::error::{AgentError, Result};
use crate::llm::backend::{BackendConfig, BackendError, BackendKind, ChatBackend};
use crate::llm::types::{ChatOutcome, Message, Role, ToolCall};

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Backend for the Anthropic Messages API.
pub struct AnthropicBackend {
    config: BackendConfig,
    http: reqwest::Client,
}

impl AnthropicBackend {
    /// Create a backend from its configuration.
    ///
    /// # Errors
    ///
    /// Fails when the API key is empty.
    pub fn new(config: BackendConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                backend: "anthropic".into(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| AgentError::Backend(BackendError::other(
                BackendKind::Anthropic,
                format!("failed to build HTTP client: {e}"),
            )))?;
        Ok(Self { config, http })
    }

    fn build_request_body(&self, messages: &[Message], tools: &[LlmTool]) -> Value {
        let (system_text, wire_messages) = messages_to_anthropic(messages);

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": wire_messages,
        });

        if let Some(system) = system_text {
            body["system"] = json!(system);
        }
        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if !tools.is_empty() {
            body["tools"] = tools_to_anthropic(tools);
        }

        body
    }
}

// Manual impl: the config carries the API key, which must not leak into
// Debug output.
impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatBackend for AnthropicBackend {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[LlmTool],
    ) -> std::result::Result<ChatOutcome, BackendError> {
        let kind = BackendKind::Anthropic;
        let url = format!("{}/v1/messages", self.config.endpoint.trim_end_matches('/'));
        let body = self.build_request_body(messages, tools);

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| BackendError::other(kind, format!("invalid api key header: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %self.config.model, tools = tools.len(), "sending LLM request");

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::other(kind, e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::other(kind, format!("failed to read response body: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(BackendError::http(kind, status, text));
        }

        let v: Value = serde_json::from_str(&text)
            .map_err(|e| BackendError::other(kind, format!("invalid JSON response: {e}")))?;
        parse_anthropic_response(&v)
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// ---------------------------------------------------------------------------
// Wire conversion (free functions)
// ---------------------------------------------------------------------------

/// Split the system message out (Anthropic expects it as a top-level field,
/// not in the `messages` array) and convert the remaining messages to the
/// Anthropic wire format.
pub fn messages_to_anthropic(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system: Option<String> = None;
    let mut wire_messages: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => match &mut system {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(&msg.content);
                }
                None => {
                    system = Some(msg.content.clone());
                }
            },
            Role::User => {
                wire_messages.push(json!({
                    "role": "user",
                    "content": msg.content,
                }));
            }
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    wire_messages.push(json!({
                        "role": "assistant",
                        "content": msg.content,
                    }));
                } else {
                    let mut content: Vec<Value> = Vec::new();
                    if !msg.content.is_empty() {
                        content.push(json!({
                            "type": "text",
                            "text": msg.content,
                        }));
                    }
                    for tc in &msg.tool_calls {
                        content.push(json!({
                            "type": "tool_use",
                            "id": tc.id,
                            "name": tc.name,
                            "input": tc.arguments,
                        }));
                    }
                    wire_messages.push(json!({
                        "role": "assistant",
                        "content": content,
                    }));
                }
            }
            Role::Tool => {
                wire_messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id,
                        "content": msg.content,
                    }],
                }));
            }
        }
    }

    (system, wire_messages)
}

/// Convert tool definitions into the Anthropic API format.
pub fn tools_to_anthropic(tools: &[LlmTool]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.parameters,
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming Anthropic Messages API response.
pub fn parse_anthropic_response(v: &Value) -> std::result::Result<ChatOutcome, BackendError> {
    let content = v["content"].as_array().ok_or_else(|| {
        BackendError::other(
            BackendKind::Anthropic,
            "missing `content` array in response",
        )
    })?;

    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<ToolCall> = Vec::new();

    for block in content {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text_parts.push(t.to_owned());
                }
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_owned(),
                    name: block["name"].as_str().unwrap_or_default().to_owned(),
                    arguments: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    let text = if text_parts.is_empty() {
        None
    } else {
        Some(text_parts.join(""))
    };
    Ok(ChatOutcome { text, tool_calls })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
