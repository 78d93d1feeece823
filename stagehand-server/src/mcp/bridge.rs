//! MCP bridge over a line-delimited JSON-RPC stream
//!
//! Requests are read one per line. Quick methods are answered inline; every
//! `tools/call` runs as its own task with its own cancellation token, so a
//! long test run does not block other calls and `notifications/cancelled`
//! can withdraw it. A single writer task owns the output stream. End of
//! input cancels every call still running.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::McpError;
use super::handlers::ToolHandlers;
use super::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolsListResult,
};
use super::tools::get_tool_definitions;
use crate::config::ConfigHandle;
use crate::engine::EngineHost;

/// Tool calls in flight, keyed by their serialized request id
type InflightCalls = Arc<DashMap<String, CancellationToken>>;

/// MCP server exposing the orchestration tools
pub struct McpBridge {
    handlers: ToolHandlers,
}

impl McpBridge {
    pub fn new(host: EngineHost, config: ConfigHandle) -> Self {
        Self {
            handlers: ToolHandlers::new(host, config),
        }
    }

    /// Serve over stdin/stdout
    pub async fn serve_stdio(&self) -> Result<(), McpError> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches end of input
    ///
    /// Calls still running at end of input are cancelled, and their responses
    /// are written before this returns.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), McpError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("MCP bridge starting");

        let (out_tx, out_rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let writer_task = tokio::spawn(write_responses(writer, out_rx));

        let inflight: InflightCalls = Arc::new(DashMap::new());
        let mut calls = JoinSet::new();
        let mut lines = BufReader::new(reader).lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("Received: {}", line);

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(request) => request,
                Err(e) => {
                    let _ = out_tx.send(JsonRpcResponse::error(
                        Value::Null,
                        JsonRpcError::new(JsonRpcError::PARSE_ERROR, e.to_string()),
                    ));
                    continue;
                }
            };

            if request.is_notification() {
                self.handle_notification(&request, &inflight);
                continue;
            }
            let id = request.id.clone().unwrap_or_default();

            if request.jsonrpc != "2.0" {
                let _ = out_tx.send(JsonRpcResponse::error(
                    id,
                    JsonRpcError::with_data(
                        JsonRpcError::INVALID_REQUEST,
                        "Invalid JSON-RPC version",
                        serde_json::json!({"expected": "2.0", "got": request.jsonrpc}),
                    ),
                ));
                continue;
            }

            if request.method == "tools/call" {
                if let Err(e) =
                    self.spawn_tool_call(id.clone(), &request.params, &inflight, &out_tx, &mut calls)
                {
                    let _ = out_tx.send(JsonRpcResponse::error(id, e.into()));
                }
                continue;
            }

            let response = match self.handle_request(&request.method) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => JsonRpcResponse::error(id, e.into()),
            };
            let _ = out_tx.send(response);
        }

        // End of input means the caller is gone; withdraw whatever it left running
        info!(pending = calls.len(), "Input closed, cancelling in-flight tool calls");
        for entry in inflight.iter() {
            entry.value().cancel();
        }
        while let Some(joined) = calls.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Tool call task failed");
            }
        }

        drop(out_tx);
        writer_task
            .await
            .map_err(|e| McpError::Internal(format!("writer task failed: {}", e)))??;

        info!("MCP bridge shutting down");
        Ok(())
    }

    /// Answer a request that does not touch the engine
    fn handle_request(&self, method: &str) -> Result<Value, McpError> {
        match method {
            "initialize" => {
                info!("MCP bridge initialized");
                Ok(serde_json::to_value(InitializeResult::default())?)
            }
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(serde_json::to_value(ToolsListResult {
                tools: get_tool_definitions(),
            })?),
            _ => Err(McpError::MethodNotFound(method.to_string())),
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest, inflight: &InflightCalls) {
        match request.method.as_str() {
            "notifications/cancelled" => {
                let Some(request_id) = request.params.get("requestId") else {
                    warn!("Cancellation notification without requestId");
                    return;
                };
                let key = request_id.to_string();
                match inflight.get(&key) {
                    Some(token) => {
                        info!(request_id = %key, "Cancelling tool call");
                        token.cancel();
                    }
                    None => debug!(request_id = %key, "Cancellation for a call that is not running"),
                }
            }
            "notifications/initialized" | "initialized" => debug!("Client initialized"),
            other => debug!(method = other, "Ignoring notification"),
        }
    }

    fn spawn_tool_call(
        &self,
        id: Value,
        params: &Value,
        inflight: &InflightCalls,
        out_tx: &mpsc::UnboundedSender<JsonRpcResponse>,
        calls: &mut JoinSet<()>,
    ) -> Result<(), McpError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpError::InvalidParams("Missing tool name".into()))?
            .to_string();
        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));

        let key = id.to_string();
        let cancel = CancellationToken::new();
        match inflight.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(McpError::InvalidRequest(format!(
                    "Request id {} is already in use by a running tool call",
                    key
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(cancel.clone());
            }
        }

        let handlers = self.handlers.clone();
        let inflight = inflight.clone();
        let out_tx = out_tx.clone();
        calls.spawn(async move {
            let result = handlers.call_tool(&name, &arguments, cancel).await;
            inflight.remove(&key);

            let response = match result.and_then(|tool_result| Ok(serde_json::to_value(tool_result)?)) {
                Ok(value) => JsonRpcResponse::success(id, value),
                Err(e) => {
                    warn!(tool = %name, error = %e, "Tool call failed");
                    JsonRpcResponse::error(id, e.into())
                }
            };
            let _ = out_tx.send(response);
        });

        Ok(())
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut out_rx: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = out_rx.recv().await {
        let mut json = serde_json::to_string(&response)?;
        debug!("Sending: {}", json);
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
