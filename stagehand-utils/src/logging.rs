//! Logging infrastructure for stagehand
//!
//! Provides unified logging setup using the tracing ecosystem.

use std::fs::File;
use std::path::Path;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, Result, StagehandError};

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr
    Stderr,
    /// Log to file under the state log directory
    File,
    /// Log to both stderr and file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "stagehand_server=debug,tokio=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Optional custom log file name (defaults to "stagehand.log")
    pub file_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            file_name: None,
        }
    }
}

impl LogConfig {
    /// Create config for the MCP bridge
    ///
    /// stdout carries the JSON-RPC stream, so logs go to a file.
    pub fn mcp_bridge() -> Self {
        Self {
            output: LogOutput::File,
            filter: std::env::var("STAGEHAND_MCP_LOG")
                .or_else(|_| std::env::var("STAGEHAND_LOG"))
                .unwrap_or_else(|_| "info".into()),
            span_events: false,
            file_line: true,
            file_name: Some("mcp-bridge.log".into()),
        }
    }

    /// Create config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            span_events: true,
            file_line: true,
            file_name: None,
        }
    }
}

/// Initialize logging with default configuration
///
/// Uses STAGEHAND_LOG env var for filter, defaults to "info"
pub fn init_logging() -> Result<()> {
    let config = LogConfig {
        filter: std::env::var("STAGEHAND_LOG").unwrap_or_else(|_| "info".into()),
        ..LogConfig::default()
    };
    init_logging_with_config(config)
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = parse_filter(&config.filter)?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    let file_name = config.file_name.as_deref().unwrap_or("stagehand.log");

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| StagehandError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::File => {
            let file = open_log_file(&paths::log_dir(), file_name)?;

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| StagehandError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::Both => {
            let file = open_log_file(&paths::log_dir(), file_name)?;

            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
                .map_err(|e| StagehandError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(())
}

fn parse_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter)
        .map_err(|e| StagehandError::config(format!("Invalid log filter: {}", e)))
}

/// Open (creating if needed) an append-mode log file inside `dir`
fn open_log_file(dir: &Path, file_name: &str) -> Result<File> {
    std::fs::create_dir_all(dir).map_err(|e| StagehandError::FileWrite {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let log_path = dir.join(file_name);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| StagehandError::FileWrite {
            path: log_path,
            source: e,
        })
}
