//! Static method invocation in the editor
//!
//! Invokes a parameterless static method by reflection and reports whether it
//! could be found and called, together with whatever it logged meanwhile.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use stagehand_protocol::{RunMethodData, RunMethodResponse};

use super::compilation::bounded;
use super::error::{OrchestrationError, TimeoutStep};
use crate::config::{ConfigHandle, TimeoutConfig};
use crate::console_log::ConsoleLogCollector;
use crate::engine::{EngineHandle, EngineHost};
use crate::response::RunMethodResult;

pub const ASSEMBLY_NAME_REQUIRED: &str = "assemblyName is required and must be non-blank.";
pub const TYPE_NAME_REQUIRED: &str = "typeName is required and must be non-blank.";
pub const METHOD_NAME_REQUIRED: &str = "methodName is required and must be non-blank.";

/// Trimmed value of a required name; `None` when absent or blank
pub fn required_name(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Error text for a failed invocation, with the stack trace appended when present
pub fn format_method_error(message: &str, stack_trace: &str) -> String {
    if stack_trace.trim().is_empty() {
        message.to_string()
    } else {
        format!("{}\nStack trace:\n{}", message, stack_trace)
    }
}

/// Check and trim every name of an invocation
fn validate(data: &RunMethodData) -> Result<RunMethodData, OrchestrationError> {
    let assembly_name = required_name(Some(data.assembly_name.as_str()))
        .ok_or_else(|| OrchestrationError::invalid_request(ASSEMBLY_NAME_REQUIRED))?;
    let type_name = required_name(Some(data.type_name.as_str()))
        .ok_or_else(|| OrchestrationError::invalid_request(TYPE_NAME_REQUIRED))?;
    let method_name = required_name(Some(data.method_name.as_str()))
        .ok_or_else(|| OrchestrationError::invalid_request(METHOD_NAME_REQUIRED))?;
    Ok(RunMethodData {
        assembly_name,
        type_name,
        method_name,
    })
}

/// Runs static methods in the connected editor
#[derive(Clone)]
pub struct RunMethodOrchestrator {
    host: EngineHost,
    config: ConfigHandle,
}

impl RunMethodOrchestrator {
    pub fn new(host: EngineHost, config: ConfigHandle) -> Self {
        Self { host, config }
    }

    /// Invoke the method; every failure is folded into the returned result
    ///
    /// The whole call is bounded by the tool budget (`test_run_secs`).
    /// Console output is collected from the moment the call starts.
    pub async fn run_method(&self, data: RunMethodData, cancel: CancellationToken) -> RunMethodResult {
        let data = match validate(&data) {
            Ok(data) => data,
            Err(e) => return RunMethodResult::failure(e.to_string(), Vec::new()),
        };
        let Some(engine) = self.host.monitor().current().handle() else {
            return RunMethodResult::failure(OrchestrationError::NotConnected.to_string(), Vec::new());
        };

        let timeouts = self.config.load().timeouts.clone();
        let collector = ConsoleLogCollector::start(self.host.subscribe_console());

        info!(
            assembly = %data.assembly_name,
            type_name = %data.type_name,
            method = %data.method_name,
            "Invoking method"
        );
        let outcome = self.invoke(engine, data, &timeouts, &cancel).await;

        if !cancel.is_cancelled() {
            tokio::time::sleep(timeouts.log_flush()).await;
        }
        let logs = collector.stop().await;

        match outcome {
            Ok(response) if response.success => {
                info!(log_entries = logs.len(), "Method invoked");
                RunMethodResult::success(logs)
            }
            Ok(response) => {
                warn!(message = %response.message, "Editor could not invoke method");
                RunMethodResult::failure(
                    format_method_error(&response.message, &response.stack_trace),
                    logs,
                )
            }
            Err(e) => {
                warn!(error = %e, log_entries = logs.len(), "Method invocation failed");
                RunMethodResult::failure(e.to_string(), logs)
            }
        }
    }

    async fn invoke(
        &self,
        engine: EngineHandle,
        data: RunMethodData,
        timeouts: &TimeoutConfig,
        cancel: &CancellationToken,
    ) -> Result<RunMethodResponse, OrchestrationError> {
        let budget = timeouts.test_run();
        let dispatcher = self.host.dispatcher().clone();
        let call = async move {
            let pending = dispatcher
                .call_on_owner(move || engine.run_method(data))
                .await
                .map_err(OrchestrationError::RunMethodFailed)?;
            debug!("Method call started, waiting for the editor");
            pending.wait().await.map_err(OrchestrationError::RunMethodFailed)
        };

        bounded(cancel, budget, call).await?.unwrap_or_else(|| {
            Err(OrchestrationError::TimedOut {
                step: TimeoutStep::RunMethod,
                elapsed: budget,
            })
        })
    }
}
