//! Configuration schema definitions

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::DEFAULT_MAX_VOICES;

/// Main configuration for Chime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChimeConfig {
    /// Audio output settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Where playback settings are persisted (None = in memory only)
    #[serde(default)]
    pub settings_path: Option<PathBuf>,

    /// External sound catalog (None = built-in sounds)
    #[serde(default)]
    pub catalog: Option<PathBuf>,
}

impl ChimeConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate < 8000 || self.audio.sample_rate > 192000 {
            bail!("Sample rate must be between 8000 and 192000");
        }
        if self.audio.buffer_size < 64 || self.audio.buffer_size > 8192 {
            bail!("Buffer size must be between 64 and 8192");
        }
        if self.audio.max_voices == 0 || self.audio.max_voices > 256 {
            bail!("Max voices must be between 1 and 256");
        }
        if let Some(catalog) = &self.catalog {
            if !catalog.exists() {
                bail!("Catalog file not found: {}", catalog.display());
            }
        }

        Ok(())
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz for offline rendering (default: 44100)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Buffer size in frames (default: 512)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u32,

    /// Output device name (None = default device)
    #[serde(default)]
    pub device: Option<String>,

    /// Cap on simultaneous voices (default: 32)
    #[serde(default = "default_max_voices")]
    pub max_voices: usize,
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_size() -> u32 { 512 }
fn default_max_voices() -> usize { DEFAULT_MAX_VOICES }

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device: None,
            max_voices: default_max_voices(),
        }
    }
}

/// Example configuration written by `chime init`
pub const EXAMPLE_CONFIG: &str = include_str!("../../chime.example.yaml");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.max_voices, 32);
        assert!(config.settings_path.is_none());
    }

    #[test]
    fn test_validate_sample_rate() {
        let mut config = ChimeConfig::default();
        config.audio.sample_rate = 4000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_buffer_size() {
        let mut config = ChimeConfig::default();
        config.audio.buffer_size = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_voices() {
        let mut config = ChimeConfig::default();
        config.audio.max_voices = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_missing_catalog() {
        let config = ChimeConfig {
            catalog: Some(PathBuf::from("/nonexistent/sounds.yaml")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_config_parses() {
        let config: ChimeConfig = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.settings_path, Some(PathBuf::from("chime-settings.json")));
    }
}
