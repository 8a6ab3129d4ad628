//! MCP (Model Context Protocol) server.
//!
//! Exposes every compiled action in the registry as an MCP tool over JSON-RPC
//! 2.0, plus one read-only `manifest://<plugin>` resource per plugin for
//! introspection.  Tool invocation dispatches straight to the compiled
//! action — there is no model loop on this path.
//!
//! The MCP specification version targeted is `2024-11-05`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use apibridge_plugins::PluginRegistry;

use crate::rpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JsonRpcRequest, JsonRpcResponse,
    METHOD_NOT_FOUND, PARSE_ERROR,
};

/// The MCP protocol version this server implements.
const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// The server name reported during initialization.
const SERVER_NAME: &str = "apibridge";

/// The server version reported during initialization.
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// URI scheme for plugin manifest resources.
const MANIFEST_SCHEME: &str = "manifest://";

// ---------------------------------------------------------------------------
// MCP-specific types
// ---------------------------------------------------------------------------

/// An MCP tool definition returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDefinition {
    /// The `plugin__action` tool name.
    pub name: String,
    /// Human-readable description of the tool.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The result of an MCP `tools/call` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    /// The content blocks returned by the tool.
    pub content: Vec<McpContent>,
    /// Whether the tool call resulted in an error.
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// A single content block within an MCP tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpContent {
    /// The content type (e.g. `"text"`).
    #[serde(rename = "type")]
    pub content_type: String,
    /// The textual content.
    pub text: String,
}

impl McpContent {
    /// Create a text content block.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            content_type: "text".into(),
            text: value.into(),
        }
    }
}

impl McpToolResult {
    /// Create a successful tool result with a single text block.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::text(text)],
            is_error: None,
        }
    }

    /// Create an error tool result with a single text block.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::text(text)],
            is_error: Some(true),
        }
    }
}

// ---------------------------------------------------------------------------
// McpServer
// ---------------------------------------------------------------------------

/// MCP protocol server backed by the plugin registry.
pub struct McpServer {
    registry: Arc<PluginRegistry>,
}

impl McpServer {
    /// Create a server over a registry.
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Handle a single JSON-RPC request and return a response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!(method = %request.method, "MCP request received");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            // Client acknowledgment after initialize; nothing to do.
            "notifications/initialized" => JsonRpcResponse::success(request.id, json!({})),
            "ping" => JsonRpcResponse::success(request.id, json!({})),
            "tools/list" => self.handle_tools_list(request.id).await,
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            "resources/list" => self.handle_resources_list(request.id).await,
            "resources/read" => self.handle_resources_read(request.id, request.params).await,
            other => {
                tracing::warn!(method = %other, "unknown MCP method");
                JsonRpcResponse::error(
                    request.id,
                    METHOD_NOT_FOUND,
                    format!("method not found: {other}"),
                )
            }
        }
    }

    /// Handle the `initialize` handshake.
    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {},
                    "resources": {}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION
                }
            }),
        )
    }

    /// Handle `tools/list`: one tool per compiled action, with the full
    /// (uncompacted) parameter schema — this path has no tool-count budget.
    async fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools: Vec<McpToolDefinition> = self
            .registry
            .to_llm_tools()
            .await
            .into_iter()
            .map(|t| McpToolDefinition {
                name: t.name,
                description: t.description,
                input_schema: t.parameters,
            })
            .collect();

        match serde_json::to_value(&tools) {
            Ok(tools_value) => JsonRpcResponse::success(id, json!({ "tools": tools_value })),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize tool list");
                JsonRpcResponse::error(id, INTERNAL_ERROR, "failed to serialize tool list")
            }
        }
    }

    /// Handle `tools/call`: resolve through the registry and execute the
    /// compiled action directly.
    async fn handle_tools_call(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_owned(),
            None => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "missing required field `name` in params",
                );
            }
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let result = match self.registry.resolve(&name).await {
            Ok((_, action)) => {
                let outcome = action.execute(arguments).await;
                if outcome.success {
                    let text = serde_json::to_string_pretty(&outcome)
                        .unwrap_or_else(|_| outcome.message.clone());
                    McpToolResult::success(text)
                } else {
                    McpToolResult::error(outcome.message)
                }
            }
            Err(e) => McpToolResult::error(e.to_string()),
        };

        match serde_json::to_value(&result) {
            Ok(v) => JsonRpcResponse::success(id, v),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize tool result");
                JsonRpcResponse::error(id, INTERNAL_ERROR, "failed to serialize tool result")
            }
        }
    }

    /// Handle `resources/list`: one manifest resource per plugin.
    async fn handle_resources_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let mut resources = Vec::new();
        for name in self.registry.plugin_names().await {
            if let Some(plugin) = self.registry.plugin(&name).await {
                resources.push(json!({
                    "uri": format!("{MANIFEST_SCHEME}{name}"),
                    "name": format!("{name} manifest"),
                    "description": plugin.description,
                    "mimeType": "application/json",
                }));
            }
        }
        JsonRpcResponse::success(id, json!({ "resources": resources }))
    }

    /// Handle `resources/read` for `manifest://<plugin>` URIs.
    async fn handle_resources_read(&self, id: Option<Value>, params: Value) -> JsonRpcResponse {
        let uri = match params.get("uri").and_then(|v| v.as_str()) {
            Some(u) => u.to_owned(),
            None => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "missing required field `uri` in params",
                );
            }
        };

        let Some(plugin_name) = uri.strip_prefix(MANIFEST_SCHEME) else {
            return JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("unsupported resource URI: {uri}"),
            );
        };

        let Some(plugin) = self.registry.plugin(plugin_name).await else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, format!("unknown resource: {uri}"));
        };

        let text = match serde_json::to_string_pretty(plugin.manifest()) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize manifest");
                return JsonRpcResponse::error(id, INTERNAL_ERROR, "failed to serialize manifest");
            }
        };

        JsonRpcResponse::success(
            id,
            json!({
                "contents": [{
                    "uri": uri,
                    "mimeType": "application/json",
                    "text": text,
                }]
            }),
        )
    }
}

// ---------------------------------------------------------------------------
// Axum wiring
// ---------------------------------------------------------------------------

/// Build a router serving the MCP endpoint at `POST /mcp`.
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_request))
        .with_state(server)
}

/// Handle an MCP JSON-RPC request body: either a single request object or an
/// array of request objects (batch mode).
pub async fn handle_mcp_request(State(server): State<Arc<McpServer>>, body: String) -> Json<Value> {
    if let Ok(batch) = serde_json::from_str::<Vec<JsonRpcRequest>>(&body) {
        if batch.is_empty() {
            return Json(json!(JsonRpcResponse::error(
                None,
                INVALID_REQUEST,
                "empty batch request",
            )));
        }
        let mut responses = Vec::with_capacity(batch.len());
        for req in batch {
            responses.push(server.handle_request(req).await);
        }
        return Json(json!(responses));
    }

    match serde_json::from_str::<JsonRpcRequest>(&body) {
        Ok(request) => {
            let response = server.handle_request(request).await;
            Json(json!(response))
        }
        Err(e) => Json(json!(JsonRpcResponse::error(
            None,
            PARSE_ERROR,
            format!("failed to parse JSON-RPC request: {e}"),
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
