//! Configuration management for the bridge
//!
//! The loaded configuration sits behind an ArcSwap so each call reads one
//! consistent snapshot while a reload can swap in a new one.

mod defaults;
mod loader;
mod schema;

pub use defaults::DEFAULT_CONFIG_TOML;
pub use loader::{parse_timeout_override, ConfigLoader, TOOL_TIMEOUT_ENV};
pub use schema::*;

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

/// Global configuration handle
pub type ConfigHandle = Arc<ArcSwap<BridgeConfig>>;

/// Create a new config handle holding `config`
pub fn new_config_handle(config: BridgeConfig) -> ConfigHandle {
    Arc::new(ArcSwap::from_pointee(config))
}

/// Reload configuration from disk into `handle`
///
/// On error the current configuration stays in place.
pub fn reload(handle: &ConfigHandle) -> stagehand_utils::Result<()> {
    let config = ConfigLoader::load_and_validate()?;
    handle.store(Arc::new(config));
    info!("Configuration reloaded");
    Ok(())
}
