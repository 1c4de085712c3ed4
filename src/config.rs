//! Console configuration
//!
//! Stored as TOML at `~/.config/hidconsole/config.toml`. A missing file
//! means defaults; missing fields take their default individually.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hidconsole_transport::{DeviceFilter, DEFAULT_FILTERS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::INTERVAL_RANGE_MS;
use crate::frame::{FrameCodec, DEFAULT_REPORT_SIZE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn default_report_size() -> usize {
    DEFAULT_REPORT_SIZE
}

fn default_batch_interval_ms() -> u64 {
    10
}

fn default_hotplug_poll_ms() -> u64 {
    500
}

fn default_filters() -> Vec<DeviceFilter> {
    DEFAULT_FILTERS.to_vec()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Fixed report length in bytes
    #[serde(default = "default_report_size")]
    pub report_size: usize,
    /// Report ID prepended to writes (0 = unnumbered reports)
    #[serde(default)]
    pub report_id: u8,
    /// Pacing between batch reports
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,
    /// Hot-plug enumeration interval
    #[serde(default = "default_hotplug_poll_ms")]
    pub hotplug_poll_ms: u64,
    /// Allow-list of eligible interfaces
    #[serde(default = "default_filters")]
    pub filters: Vec<DeviceFilter>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            report_size: default_report_size(),
            report_id: 0,
            batch_interval_ms: default_batch_interval_ms(),
            hotplug_poll_ms: default_hotplug_poll_ms(),
            filters: default_filters(),
        }
    }
}

impl ConsoleConfig {
    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hidconsole")
            .join("config.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ConsoleConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.report_size == 0 {
            return Err(ConfigError::Invalid("report_size must be at least 1".into()));
        }
        if !INTERVAL_RANGE_MS.contains(&self.batch_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "batch_interval_ms must be within {}..={}",
                INTERVAL_RANGE_MS.start(),
                INTERVAL_RANGE_MS.end()
            )));
        }
        if self.hotplug_poll_ms == 0 {
            return Err(ConfigError::Invalid("hotplug_poll_ms must be greater than zero".into()));
        }
        if self.filters.is_empty() {
            return Err(ConfigError::Invalid("filters must not be empty".into()));
        }
        Ok(())
    }

    pub fn codec(&self) -> Result<FrameCodec, ConfigError> {
        FrameCodec::new(self.report_size).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn hotplug_poll_interval(&self) -> Duration {
        Duration::from_millis(self.hotplug_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConsoleConfig::default();
        config.validate().unwrap();
        assert_eq!(config.report_size, 32);
        assert_eq!(config.report_id, 0);
        assert_eq!(config.batch_interval(), Duration::from_millis(10));
        assert_eq!(config.filters.len(), 10);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: ConsoleConfig = toml::from_str("report_size = 64").unwrap();
        assert_eq!(config.report_size, 64);
        assert_eq!(config.hotplug_poll_ms, 500);
        assert_eq!(config.filters, DEFAULT_FILTERS.to_vec());
    }

    #[test]
    fn test_custom_filters() {
        let toml_str = r#"
            [[filters]]
            vendor_id = 0x1209
            product_id = 0x0001
        "#;
        let config: ConsoleConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.filters.len(), 1);
        assert_eq!(config.filters[0].usage_page, None);
        assert!(config.filters[0].matches(0x1209, 0x0001, 0x0001, 0x06));
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = ConsoleConfig {
            batch_interval_ms: 5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.batch_interval_ms = 10_000;
        config.validate().unwrap();
        config.report_size = 0;
        assert!(config.validate().is_err());
        config.report_size = 32;
        config.filters.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip() {
        let config = ConsoleConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConsoleConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
