//! MCP error types

use std::io;

use super::protocol::JsonRpcError;

/// MCP server errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// IO error (reader/writer)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request is well-formed JSON but not acceptable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Method not found
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Unknown tool
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        match err {
            McpError::MethodNotFound(method) => {
                JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, format!("Method not found: {}", method))
            }
            McpError::InvalidRequest(msg) => JsonRpcError::new(JsonRpcError::INVALID_REQUEST, msg),
            McpError::InvalidParams(msg) => JsonRpcError::new(JsonRpcError::INVALID_PARAMS, msg),
            McpError::UnknownTool(name) => {
                JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, format!("Unknown tool: {}", name))
            }
            McpError::Io(err) => {
                JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, format!("IO error: {}", err))
            }
            McpError::Json(err) => {
                JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("JSON error: {}", err))
            }
            McpError::Internal(msg) => JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, msg),
        }
    }
}
