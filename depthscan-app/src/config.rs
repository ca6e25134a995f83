//! Scan configuration loaded from an optional JSON file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use depthscan_capture::SyntheticConfig;
use depthscan_ingest::DispatchConfig;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Also send spans to Tracy (requires the `tracy` feature).
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

/// Everything needed to run one scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub dispatch: DispatchConfig,
    pub sensor: SyntheticConfig,
    /// Seconds to wait for the quota; `0` waits forever.
    pub timeout_secs: u64,
    pub logging: LoggingConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            sensor: SyntheticConfig::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            logging: LoggingConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dispatch
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.sensor
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.sensor.device_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sensor device id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = ScanConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.timeout(), Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = ScanConfig::from_json_str(
            r#"{
                "dispatch": { "quota": 12, "workers": 3 },
                "sensor": { "frame_rate": 15.0, "missing_depth_every": 4 },
                "timeout_secs": 0,
                "logging": { "level": "debug" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.dispatch.quota, 12);
        assert_eq!(config.dispatch.workers, 3);
        assert_eq!(
            config.dispatch.queue_capacity,
            DispatchConfig::default().queue_capacity
        );
        assert_eq!(config.sensor.frame_rate, 15.0);
        assert_eq!(config.sensor.missing_depth_every, Some(4));
        assert_eq!(config.timeout(), None);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ScanConfig::default();
        config.dispatch.workers = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ScanConfig::default();
        config.sensor.frame_rate = -1.0;
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.sensor.frame_rate = 1e-30;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = ScanConfig::load(Some(Path::new("/nonexistent/depthscan.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_no_path_gives_defaults() {
        assert_eq!(ScanConfig::load(None).unwrap(), ScanConfig::default());
    }
}
