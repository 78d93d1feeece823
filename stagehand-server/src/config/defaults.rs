//! Default configuration values
//!
//! These are embedded in the binary and used when no config file exists.

/// Default configuration as TOML (for reference/documentation)
pub const DEFAULT_CONFIG_TOML: &str = r##"
# stagehand configuration

[timeouts]
# Wait for the editor to connect before a test run
connect_secs = 30
# Whole test-run call (MCP_TOOL_TIMEOUT overrides this)
test_run_secs = 300
# Wait for the editor to come back after a domain reload mid-run
reconnect_secs = 120
# Asset refresh before a compilation check
refresh_secs = 120
post_refresh_reconnect_secs = 120
compile_query_secs = 60
abort_secs = 5
log_flush_ms = 500
"##;
