//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<ChimeConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let mut config: ChimeConfig = serde_yaml::from_str(&contents)
        .with_context(|| format!("invalid config: {}", path.display()))?;

    // Relative paths are resolved against the config file
    if let Some(dir) = path.parent() {
        config.settings_path = config.settings_path.map(|p| dir.join(p));
        config.catalog = config.catalog.map(|p| dir.join(p));
    }

    config.validate()?;
    Ok(config)
}
