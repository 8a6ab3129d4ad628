//! OpenAI Chat Completions backend.
//!
//! Also covers OpenAI-compatible endpoints (Ollama, Together, vLLM); the
//! backend identity is inferred from the configured endpoint so error
//! messages can point at the right knob.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use apibridge_plugins::LlmTool;

use crate::error::{AgentError, Result};
use crate::llm::backend::{BackendConfig, BackendError, BackendKind, ChatBackend};
use crate::llm::types::{ChatOutcome, Message, Role, ToolCall};

/// Backend for the OpenAI Chat Completions API and compatible endpoints.
pub struct OpenAiBackend {
    config: BackendConfig,
    kind: BackendKind,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend from its configuration.
    ///
    /// # Errors
    ///
    /// Fails when the API key is empty.
    pub fn new(config: BackendConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                backend: "openai".into(),
            });
        }
        let kind = config.kind();
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| {
                AgentError::Backend(BackendError::other(
                    kind,
                    format!("failed to build HTTP client: {e}"),
                ))
            })?;
        Ok(Self { config, kind, http })
    }

    fn build_request_body(&self, messages: &[Message], tools: &[LlmTool]) -> Value {
        let mut body = json!({
            "model": self.config.model,
            "messages": messages_to_openai(messages),
            "max_tokens": self.config.max_tokens,
        });

        if let Some(temp) = self.config.temperature {
            body["temperature"] = json!(temp);
        }
        if !tools.is_empty() {
            body["tools"] = tools_to_openai(tools);
        }

        body
    }
}

// Manual impl: the config carries the API key, which must not leak into
// Debug output.
impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("endpoint", &self.config.endpoint)
            .field("model", &self.config.model)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[LlmTool],
    ) -> std::result::Result<ChatOutcome, BackendError> {
        let url = format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        );
        let body = self.build_request_body(messages, tools);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(|e| {
                BackendError::other(self.kind, format!("invalid authorization header: {e}"))
            })?,
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
            .map_err(|e| BackendError::other(self.kind, e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            BackendError::other(self.kind, format!("failed to read response body: {e}"))
        })?;

        if !(200..300).contains(&status) {
            return Err(BackendError::http(self.kind, status, text));
        }

        let v: Value = serde_json::from_str(&text)
            .map_err(|e| BackendError::other(self.kind, format!("invalid JSON response: {e}")))?;
        parse_openai_response(self.kind, &v)
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}

// ---------------------------------------------------------------------------
// Wire conversion (free functions)
// ---------------------------------------------------------------------------

/// Convert uniform messages to the OpenAI Chat Completions wire format.
///
/// System messages stay in the `messages` array, tool calls ride in
/// `assistant.tool_calls` with stringified arguments, and tool results use
/// `role: "tool"` with a `tool_call_id`.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    let mut wire_messages: Vec<Value> = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System => {
                wire_messages.push(json!({
                    "role": "system",
                    "content": msg.content,
                }));
            }
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
                    let tool_calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string(),
                                }
                            })
                        })
                        .collect();

                    let mut m = json!({
                        "role": "assistant",
                        "tool_calls": tool_calls,
                    });
                    if !msg.content.is_empty() {
                        m["content"] = json!(msg.content);
                    }
                    wire_messages.push(m);
                }
            }
            Role::Tool => {
                wire_messages.push(json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id,
                    "content": msg.content,
                }));
            }
        }
    }

    wire_messages
}

/// Convert tool definitions into the OpenAI Chat Completions format.
///
/// OpenAI wraps each tool in `{"type": "function", "function": {...}}`.
pub fn tools_to_openai(tools: &[LlmTool]) -> Value {
    let tool_values: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect();
    json!(tool_values)
}

/// Parse a non-streaming OpenAI Chat Completions response.
pub fn parse_openai_response(
    kind: BackendKind,
    v: &Value,
) -> std::result::Result<ChatOutcome, BackendError> {
    let message = &v["choices"][0]["message"];
    if message.is_null() {
        return Err(BackendError::other(
            kind,
            "missing `choices[0].message` in response",
        ));
    }

    let text = message["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    let mut tool_calls: Vec<ToolCall> = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for tc in calls {
            let func = &tc["function"];
            let name = func["name"].as_str().unwrap_or_default().to_owned();
            let args_str = func["arguments"].as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(args_str).map_err(|e| {
                BackendError::other(
                    kind,
                    format!("invalid JSON in tool call `{name}` arguments: {e}"),
                )
            })?;
            tool_calls.push(ToolCall {
                id: tc["id"].as_str().unwrap_or_default().to_owned(),
                name,
                arguments,
            });
        }
    }

    Ok(ChatOutcome { text, tool_calls })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_round_trip_framing() {
        let messages = vec![
            Message::system("Be helpful."),
            Message::user("Add milk to the list"),
            Message::assistant_tool_calls(
                "",
                vec![ToolCall {
                    id: "call_1".into(),
                    name: "tasks__add_item".into(),
                    arguments: json!({"text": "milk"}),
                }],
            ),
            Message::tool_result("call_1", "{\"success\":true}"),
        ];

        let wire = messages_to_openai(&messages);
        assert_eq!(wire.len(), 4);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[2]["tool_calls"][0]["function"]["name"], "tasks__add_item");
        // Arguments are a JSON *string* on the OpenAI wire.
        assert_eq!(
            wire[2]["tool_calls"][0]["function"]["arguments"],
            "{\"text\":\"milk\"}"
        );
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn tools_are_function_wrapped() {
        let tools = vec![LlmTool {
            name: "tasks__add_item".into(),
            description: "Add a task".into(),
            parameters: json!({"type": "object", "properties": {"text": {"type": "string"}}}),
        }];
        let wire = tools_to_openai(&tools);
        assert_eq!(wire[0]["type"], "function");
        assert_eq!(wire[0]["function"]["name"], "tasks__add_item");
        assert!(wire[0]["function"]["parameters"].is_object());
    }

    #[test]
    fn parse_tool_call_response() {
        let v = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_7",
                        "type": "function",
                        "function": {"name": "music__pause", "arguments": "{}"}
                    }]
                }
            }]
        });
        let outcome = parse_openai_response(BackendKind::OpenAi, &v).unwrap();
        assert!(outcome.text.is_none());
        assert_eq!(outcome.tool_calls[0].id, "call_7");
    }

    #[test]
    fn parse_text_response() {
        let v = json!({"choices": [{"message": {"content": "All done."}}]});
        let outcome = parse_openai_response(BackendKind::OpenAi, &v).unwrap();
        assert_eq!(outcome.text.as_deref(), Some("All done."));
        assert!(outcome.is_final());
    }

    #[test]
    fn invalid_arguments_json_is_an_error() {
        let v = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "x__y", "arguments": "{not json"}
                    }]
                }
            }]
        });
        assert!(parse_openai_response(BackendKind::OpenAi, &v).is_err());
    }
}
