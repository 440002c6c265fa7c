//! Engine configuration
//!
//! YAML-backed configuration for the audio engine: preferred sample rate and
//! buffer size, analysis cadence, and the initial master level. Loading is
//! forgiving (missing or invalid files fall back to defaults); saving
//! creates parent directories as needed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::SAMPLE_RATE;

/// Engine configuration, serialized as YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preferred sample rate in Hz (the device may negotiate a different one)
    pub sample_rate: u32,
    /// Preferred output buffer size in frames
    pub buffer_size: u32,
    /// Analysis cadence in milliseconds (one snapshot per interval per channel)
    pub analysis_interval_ms: u64,
    /// Initial master gain (0.0 to 1.0)
    pub master_gain: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            buffer_size: 512,
            analysis_interval_ms: 16,
            master_gain: 1.0,
        }
    }
}

/// Default config file path: `~/.config/mixdeck/engine.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mixdeck")
        .join("engine.yaml")
}

/// Load configuration from a YAML file
///
/// Missing file returns defaults; an unparsable file logs a warning and
/// returns defaults, never an error.
pub fn load_config(path: &Path) -> EngineConfig {
    if !path.exists() {
        log::info!("load_config: {:?} does not exist, using defaults", path);
        return EngineConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<EngineConfig>(&contents) {
            Ok(config) => {
                log::info!("load_config: loaded {:?}", path);
                config
            }
            Err(e) => {
                log::warn!("load_config: failed to parse config: {}, using defaults", e);
                EngineConfig::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read config file: {}, using defaults", e);
            EngineConfig::default()
        }
    }
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config(config: &EngineConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config: {:?}", path))?;

    log::info!("save_config: saved {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.buffer_size, 512);
        assert_eq!(config.master_gain, 1.0);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Path::new("/no/such/path/engine.yaml"));
        assert_eq!(config.sample_rate, EngineConfig::default().sample_rate);
    }

    #[test]
    fn test_config_path_includes_filename() {
        let path = default_config_path();
        assert!(path.ends_with("engine.yaml"));
    }
}
