//! Configuration for the editor watcher.

use crate::core::{sanitize_rate, DEFAULT_MAX_HEARTBEATS_PER_SEC};
use crate::store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default port of the editor bridge.
pub const DEFAULT_BRIDGE_PORT: u16 = 5699;

/// Main configuration for the watcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound on same-file heartbeats per second
    #[serde(alias = "maxHeartbeatsPerSec", with = "lenient_rate")]
    pub max_heartbeats_per_sec: f64,

    /// Event store connection
    pub store: StoreConfig,

    /// Port the editor bridge listens on
    pub bridge_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_heartbeats_per_sec: DEFAULT_MAX_HEARTBEATS_PER_SEC,
            store: StoreConfig::default(),
            bridge_port: DEFAULT_BRIDGE_PORT,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, using defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aw-watcher-editor")
            .join("config.json")
    }

    /// The rate limit actually applied.
    ///
    /// Zero, negative and non-finite values fall back to the default.
    pub fn effective_max_heartbeats_per_sec(&self) -> f64 {
        let rate = sanitize_rate(self.max_heartbeats_per_sec);
        if rate != self.max_heartbeats_per_sec {
            tracing::warn!(
                configured = self.max_heartbeats_per_sec,
                "Invalid max_heartbeats_per_sec, using {rate}"
            );
        }
        rate
    }
}

/// Where the controller (re)loads its configuration from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Read from a JSON file on every load
    File(PathBuf),
    /// A fixed configuration
    Fixed(Config),
}

impl ConfigSource {
    /// Load the configuration, falling back to defaults on error.
    pub fn load(&self) -> Config {
        match self {
            ConfigSource::File(path) => Config::load_from(path).unwrap_or_else(|e| {
                tracing::warn!("Could not load config from {}: {e}", path.display());
                Config::default()
            }),
            ConfigSource::Fixed(config) => config.clone(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Accepts any JSON value for the rate; anything that is not a number maps
/// to zero and is replaced by the default when applied.
mod lenient_rate {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(rate: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        rate.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_f64().unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.max_heartbeats_per_sec, 1.0);
        assert_eq!(config.bridge_port, DEFAULT_BRIDGE_PORT);
        assert_eq!(config.store.effective_port(), 5600);
    }

    #[test]
    fn test_camel_case_alias() {
        let config: Config = serde_json::from_str(r#"{"maxHeartbeatsPerSec": 4}"#).unwrap();
        assert_eq!(config.effective_max_heartbeats_per_sec(), 4.0);
    }

    #[test]
    fn test_invalid_rates_fall_back() {
        for raw in [
            r#"{"max_heartbeats_per_sec": 0}"#,
            r#"{"max_heartbeats_per_sec": -2.5}"#,
            r#"{"max_heartbeats_per_sec": "fast"}"#,
        ] {
            let config: Config = serde_json::from_str(raw).unwrap();
            assert_eq!(config.effective_max_heartbeats_per_sec(), 1.0, "{raw}");
        }
    }

    #[test]
    fn test_partial_store_section() {
        let config: Config =
            serde_json::from_str(r#"{"store": {"testing": true}, "bridge_port": 6000}"#).unwrap();
        assert_eq!(config.store.host, "127.0.0.1");
        assert_eq!(config.store.effective_port(), 5666);
        assert_eq!(config.bridge_port, 6000);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            max_heartbeats_per_sec: 3.0,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
        assert_eq!(ConfigSource::File(path).load(), config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_file_source_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(Config::load_from(&path).is_err());
        assert_eq!(ConfigSource::File(path).load(), Config::default());
    }
}
