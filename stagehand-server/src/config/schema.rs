//! Configuration schema structs

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub timeouts: TimeoutConfig,
}

/// Time budgets for each orchestration step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Initial wait for the engine to connect
    pub connect_secs: u64,
    /// Overall test-run call, overridable with `MCP_TOOL_TIMEOUT`
    pub test_run_secs: u64,
    /// Wait for the engine to come back after a mid-run disconnect
    pub reconnect_secs: u64,
    /// Asset refresh before a compilation check
    pub refresh_secs: u64,
    /// Wait for the engine after a refresh-triggered reload
    pub post_refresh_reconnect_secs: u64,
    /// Compile result query
    pub compile_query_secs: u64,
    /// Best-effort abort on timeout or cancellation
    pub abort_secs: u64,
    /// Settle delay before collected console logs are returned
    pub log_flush_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            test_run_secs: 300,
            reconnect_secs: 120,
            refresh_secs: 120,
            post_refresh_reconnect_secs: 120,
            compile_query_secs: 60,
            abort_secs: 5,
            log_flush_ms: 500,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn test_run(&self) -> Duration {
        Duration::from_secs(self.test_run_secs)
    }

    pub fn reconnect(&self) -> Duration {
        Duration::from_secs(self.reconnect_secs)
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn post_refresh_reconnect(&self) -> Duration {
        Duration::from_secs(self.post_refresh_reconnect_secs)
    }

    pub fn compile_query(&self) -> Duration {
        Duration::from_secs(self.compile_query_secs)
    }

    pub fn abort(&self) -> Duration {
        Duration::from_secs(self.abort_secs)
    }

    pub fn log_flush(&self) -> Duration {
        Duration::from_millis(self.log_flush_ms)
    }
}
