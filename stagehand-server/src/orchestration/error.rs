//! Orchestration error taxonomy

use std::time::Duration;

use crate::engine::EngineError;

/// Message for a request without any usable assembly name
pub const ASSEMBLY_NAMES_REQUIRED: &str =
    "assemblyNames is required and must contain at least one non-empty assembly name.";

/// Which connection wait ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    /// Before the first launch
    Initial,
    /// After the engine dropped out during a test run
    MidRun,
    /// After an asset refresh reloaded the engine
    AfterRefresh,
}

/// Which bounded step ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStep {
    TestRun,
    Refresh,
    CompilationQuery,
    RunMethod,
}

/// Errors returned by the orchestrators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestrationError {
    /// The request was rejected before touching the engine
    #[error("{0}")]
    InvalidRequest(String),

    /// The engine did not (re)connect within its budget
    #[error("{}", connect_timeout_message(.phase, .waited))]
    ConnectionTimedOut { phase: ConnectPhase, waited: Duration },

    /// No engine is connected right now
    #[error("Editor is not connected. Open the editor with the project.")]
    NotConnected,

    /// The engine channel closed for good during the call
    #[error("Editor connection was closed during the test run.")]
    ConnectionClosed,

    /// A bounded step did not finish in time
    #[error("{}", timeout_message(.step, .elapsed))]
    TimedOut { step: TimeoutStep, elapsed: Duration },

    /// The caller withdrew the request
    #[error("Request was cancelled.")]
    Cancelled,

    #[error("Failed to start asset refresh: {0}")]
    RefreshStartFailed(EngineError),

    #[error("Failed to query compilation result: {0}")]
    CompilationQueryFailed(EngineError),

    #[error("Failed to run method: {0}")]
    RunMethodFailed(EngineError),

    #[error("Compilation failed. Fix compiler errors before running tests.")]
    CompilationFailed,

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

impl OrchestrationError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the engine connection is the reason the call failed
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimedOut { .. } | Self::NotConnected | Self::ConnectionClosed
        )
    }

    /// Whether an immediate retry is reasonable
    ///
    /// Timeouts call for backing off; validation and compile errors need a fix.
    pub fn is_retryable(&self) -> bool {
        self.is_cancelled() || self.is_connectivity()
    }
}

fn connect_timeout_message(phase: &ConnectPhase, waited: &Duration) -> String {
    let waited = describe_duration(*waited);
    match phase {
        ConnectPhase::Initial => format!(
            "Editor did not connect within {}. Please open the editor with the project.",
            waited
        ),
        ConnectPhase::MidRun => format!(
            "Editor did not reconnect within {} after disconnecting during the test run.",
            waited
        ),
        ConnectPhase::AfterRefresh => format!(
            "Editor did not reconnect within {} after asset refresh.",
            waited
        ),
    }
}

fn timeout_message(step: &TimeoutStep, elapsed: &Duration) -> String {
    let elapsed = describe_duration(*elapsed);
    match step {
        TimeoutStep::TestRun => format!("Test execution timed out after {}.", elapsed),
        TimeoutStep::Refresh => format!("Asset refresh timed out after {}.", elapsed),
        TimeoutStep::CompilationQuery => {
            format!("Compilation result query timed out after {}.", elapsed)
        }
        TimeoutStep::RunMethod => format!("Method invocation timed out after {}.", elapsed),
    }
}

/// Human-readable duration: whole minutes, else seconds, else milliseconds
pub fn describe_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis % 1000 != 0 {
        return format!("{} ms", millis);
    }
    let secs = duration.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    } else if secs == 1 {
        "1 second".to_string()
    } else {
        format!("{} seconds", secs)
    }
}
