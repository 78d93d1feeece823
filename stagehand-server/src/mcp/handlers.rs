//! MCP tool handlers
//!
//! Each handler parses tool arguments, calls into the orchestration layer and
//! renders the outcome as a JSON text result. Orchestration failures become
//! `{"success": false, "message": ...}` results rather than protocol errors;
//! only malformed arguments are reported as JSON-RPC errors.

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stagehand_protocol::{RunMethodData, RunTestsRequest, TestFilter, TestMode};

use super::error::McpError;
use super::protocol::ToolResult;
use super::tools::{GET_COMPILATION_RESULT, PLAY_CONTROL, RUN_METHOD, RUN_TESTS};
use crate::config::ConfigHandle;
use crate::engine::EngineHost;
use crate::orchestration::{
    CompilationCheckOrchestrator, OrchestrationError, PlayAction, PlayControl,
    RunMethodOrchestrator, TestRunOrchestrator, ASSEMBLY_NAMES_REQUIRED,
};
use crate::response::error_json;

const TEST_MODE_REQUIRED: &str =
    "testMode is required. Valid values: EditMode, PlayMode (case insensitive).";

/// Tool dispatch over the orchestrators
#[derive(Clone)]
pub struct ToolHandlers {
    test_runs: TestRunOrchestrator,
    compilation: CompilationCheckOrchestrator,
    methods: RunMethodOrchestrator,
    play: PlayControl,
}

impl ToolHandlers {
    pub fn new(host: EngineHost, config: ConfigHandle) -> Self {
        Self {
            test_runs: TestRunOrchestrator::new(host.clone(), config.clone()),
            compilation: CompilationCheckOrchestrator::new(host.clone(), config.clone()),
            methods: RunMethodOrchestrator::new(host.clone(), config),
            play: PlayControl::new(host),
        }
    }

    /// Dispatch a tool call by name
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Value,
        cancel: CancellationToken,
    ) -> Result<ToolResult, McpError> {
        debug!(tool = name, "Calling tool");
        match name {
            RUN_TESTS => self.run_tests(arguments, cancel).await,
            GET_COMPILATION_RESULT => {
                let result = self.compilation.check_compilation(cancel).await;
                let tool_result = render(&result, !result.success)?;
                Ok(tool_result)
            }
            RUN_METHOD => {
                // Blank or missing names are reported by the orchestrator
                let data = RunMethodData::new(
                    optional_str(arguments, "assemblyName")?.unwrap_or_default(),
                    optional_str(arguments, "typeName")?.unwrap_or_default(),
                    optional_str(arguments, "methodName")?.unwrap_or_default(),
                );
                let result = self.methods.run_method(data, cancel).await;
                render(&result, !result.success)
            }
            PLAY_CONTROL => self.play_control(arguments).await,
            _ => Err(McpError::UnknownTool(name.to_string())),
        }
    }

    async fn run_tests(&self, arguments: &Value, cancel: CancellationToken) -> Result<ToolResult, McpError> {
        let filter = TestFilter {
            assembly_names: string_list(arguments, "assemblyNames")?,
            test_names: string_list(arguments, "testNames")?,
            group_names: string_list(arguments, "groupNames")?,
            category_names: string_list(arguments, "categoryNames")?,
        };
        if !filter.has_valid_assembly_names() {
            return Ok(error_result(ASSEMBLY_NAMES_REQUIRED));
        }

        let mode = match optional_str(arguments, "testMode")? {
            None => return Ok(error_result(TEST_MODE_REQUIRED)),
            Some(raw) => match TestMode::parse(raw) {
                Some(mode) => mode,
                None => {
                    return Ok(error_result(&format!(
                        "Invalid testMode: '{}'. Valid values: EditMode, edit, PlayMode, play (case insensitive).",
                        raw
                    )))
                }
            },
        };

        match self
            .test_runs
            .run_tests(RunTestsRequest::new(mode, filter), cancel)
            .await
        {
            Ok(summary) => {
                info!(success = summary.success(), total = summary.total(), "run_tests finished");
                render(&summary, false)
            }
            Err(e) => Ok(orchestration_error(&e)),
        }
    }

    async fn play_control(&self, arguments: &Value) -> Result<ToolResult, McpError> {
        let action = match PlayAction::from_argument(optional_str(arguments, "action")?) {
            Ok(action) => action,
            Err(e) => return Ok(orchestration_error(&e)),
        };

        match self.play.control(action).await {
            Ok(outcome) => render(&outcome, false),
            Err(e) => Ok(orchestration_error(&e)),
        }
    }
}

fn render<T: Serialize>(value: &T, is_error: bool) -> Result<ToolResult, McpError> {
    let text = serde_json::to_string(value)?;
    Ok(if is_error {
        ToolResult::error(text)
    } else {
        ToolResult::text(text)
    })
}

fn error_result(message: &str) -> ToolResult {
    ToolResult::error(error_json(message).to_string())
}

fn orchestration_error(error: &OrchestrationError) -> ToolResult {
    debug!(error = %error, timeout = error.is_timeout(), cancelled = error.is_cancelled(), "Tool call failed");
    error_result(&error.to_string())
}

/// Read an optional string argument; null counts as absent
fn optional_str<'a>(arguments: &'a Value, key: &str) -> Result<Option<&'a str>, McpError> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(McpError::InvalidParams(format!("{} must be a string", key))),
    }
}

/// Read an optional string array argument; absent or null is empty
fn string_list(arguments: &Value, key: &str) -> Result<Vec<String>, McpError> {
    match arguments.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| McpError::InvalidParams(format!("{} must contain only strings", key)))
            })
            .collect(),
        Some(_) => Err(McpError::InvalidParams(format!("{} must be an array of strings", key))),
    }
}
