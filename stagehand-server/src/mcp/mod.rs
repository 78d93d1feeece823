//! MCP tool surface
//!
//! Exposes test runs, compilation checks and play-mode control as MCP tools
//! over newline-delimited JSON-RPC 2.0.

mod bridge;
mod error;
mod handlers;
mod protocol;
mod tools;

pub use bridge::McpBridge;
pub use error::McpError;
pub use handlers::ToolHandlers;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, Tool, ToolContent, ToolResult};
pub use tools::get_tool_definitions;
