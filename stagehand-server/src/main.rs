//! stagehand - MCP bridge over stdio
//!
//! Editor adapters attach through [`EngineHost`]; until one reports a
//! connection, every tool answers that the editor is not connected.

use stagehand_server::{new_config_handle, ConfigLoader, EngineHost, McpBridge};
use stagehand_utils::{LogConfig, Result, StagehandError};
use tracing::{error, info};

/// Run the MCP bridge until stdin closes
async fn run_mcp_bridge() -> Result<()> {
    let config = ConfigLoader::load_and_validate()?;
    info!(
        test_run_secs = config.timeouts.test_run_secs,
        connect_secs = config.timeouts.connect_secs,
        "stagehand starting"
    );

    let bridge = McpBridge::new(EngineHost::new(), new_config_handle(config));
    bridge
        .serve_stdio()
        .await
        .map_err(|e| StagehandError::internal(e.to_string()))?;

    info!("stagehand stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries JSON-RPC, so logs go to the state log file
    stagehand_utils::init_logging_with_config(LogConfig::mcp_bridge())?;

    if let Err(e) = run_mcp_bridge().await {
        error!("stagehand failed: {}", e);
        return Err(e);
    }
    Ok(())
}
