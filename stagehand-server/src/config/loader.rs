//! Configuration loader

use std::path::Path;

use stagehand_utils::{config_file, Result, StagehandError};
use tracing::{debug, warn};

use super::BridgeConfig;

/// Environment variable overriding the test-run budget, in seconds
pub const TOOL_TIMEOUT_ENV: &str = "MCP_TOOL_TIMEOUT";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from default location
    pub fn load() -> Result<BridgeConfig> {
        let path = config_file();
        if path.exists() {
            Self::load_from_path(&path)
        } else {
            Ok(BridgeConfig::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<BridgeConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| StagehandError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<BridgeConfig> {
        toml::from_str(content).map_err(|e| StagehandError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validate configuration
    pub fn validate(config: &BridgeConfig) -> Result<()> {
        let t = &config.timeouts;
        let budgets = [
            ("connect_secs", t.connect_secs),
            ("test_run_secs", t.test_run_secs),
            ("reconnect_secs", t.reconnect_secs),
            ("refresh_secs", t.refresh_secs),
            ("post_refresh_reconnect_secs", t.post_refresh_reconnect_secs),
            ("compile_query_secs", t.compile_query_secs),
            ("abort_secs", t.abort_secs),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(StagehandError::config(format!(
                    "timeouts.{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Apply environment overrides on top of a loaded config
    pub fn apply_env_overrides(config: &mut BridgeConfig) {
        let Ok(raw) = std::env::var(TOOL_TIMEOUT_ENV) else {
            return;
        };
        match parse_timeout_override(&raw) {
            Some(secs) => {
                debug!(secs, "Test-run timeout overridden from {}", TOOL_TIMEOUT_ENV);
                config.timeouts.test_run_secs = secs;
            }
            None => {
                warn!(value = %raw, "Ignoring invalid {} value", TOOL_TIMEOUT_ENV);
            }
        }
    }

    /// Load, apply environment overrides and validate
    pub fn load_and_validate() -> Result<BridgeConfig> {
        let mut config = Self::load()?;
        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }
}

/// Parse a timeout override; non-numeric and non-positive values are rejected
pub fn parse_timeout_override(raw: &str) -> Option<u64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(|secs| secs as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(
            &path,
            r#"
            [timeouts]
            test_run_secs = 600
            log_flush_ms = 50
            "#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.timeouts.test_run_secs, 600);
        assert_eq!(config.timeouts.log_flush_ms, 50);
        // Unspecified values keep their defaults
        assert_eq!(config.timeouts.connect_secs, 30);
    }

    #[test]
    fn test_load_missing_path_is_read_error() {
        let dir = tempdir().unwrap();
        let err = ConfigLoader::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, StagehandError::FileRead { .. }));
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ConfigLoader::parse("invalid { toml", Path::new("test.toml"));
        assert!(matches!(result, Err(StagehandError::ConfigInvalid { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = BridgeConfig::default();
        assert!(ConfigLoader::validate(&config).is_ok());

        config.timeouts.reconnect_secs = 0;
        let err = ConfigLoader::validate(&config).unwrap_err();
        assert!(err.to_string().contains("reconnect_secs"));
    }

    #[test]
    fn test_zero_log_flush_is_allowed() {
        let mut config = BridgeConfig::default();
        config.timeouts.log_flush_ms = 0;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_parse_timeout_override() {
        assert_eq!(parse_timeout_override("600"), Some(600));
        assert_eq!(parse_timeout_override(" 45 "), Some(45));
        assert_eq!(parse_timeout_override("0"), None);
        assert_eq!(parse_timeout_override("-10"), None);
        assert_eq!(parse_timeout_override("five"), None);
        assert_eq!(parse_timeout_override(""), None);
    }

    #[test]
    fn test_apply_env_overrides() {
        let original = std::env::var(TOOL_TIMEOUT_ENV).ok();

        let mut config = BridgeConfig::default();
        std::env::set_var(TOOL_TIMEOUT_ENV, "90");
        ConfigLoader::apply_env_overrides(&mut config);
        assert_eq!(config.timeouts.test_run_secs, 90);

        std::env::set_var(TOOL_TIMEOUT_ENV, "not-a-number");
        ConfigLoader::apply_env_overrides(&mut config);
        assert_eq!(config.timeouts.test_run_secs, 90);

        match original {
            Some(val) => std::env::set_var(TOOL_TIMEOUT_ENV, val),
            None => std::env::remove_var(TOOL_TIMEOUT_ENV),
        }
    }
}
