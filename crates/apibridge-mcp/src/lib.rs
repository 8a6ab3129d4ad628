//! MCP protocol server.
//!
//! Bridges the plugin registry to remote callers over JSON-RPC 2.0: every
//! compiled action becomes a callable tool, every manifest a readable
//! resource.  Execution goes straight through the compiled action — no model
//! in this path.

pub mod rpc;
pub mod server;

pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{McpContent, McpServer, McpToolDefinition, McpToolResult, handle_mcp_request, router};
