//! Configuration for the capture engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::{PipelineConfig, DEFAULT_INTERVAL, DEFAULT_THRESHOLD};

/// Main configuration, stored as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker pool size; unset means one per source plus two
    pub worker_threads: Option<usize>,

    /// Buffered record count that triggers a drain
    pub store_n_events: usize,

    /// Time between unconditional drains
    #[serde(with = "duration_serde")]
    pub store_after: Duration,

    /// Output specs: `-`, `*.json` or `*.jsonl`
    pub outputs: Vec<String>,

    /// Event device nodes to capture; empty means every node
    pub devices: Vec<PathBuf>,

    /// JSON Lines files of raw events to replay
    pub replay: Vec<PathBuf>,

    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_threads: None,
            store_n_events: DEFAULT_THRESHOLD,
            store_after: DEFAULT_INTERVAL,
            outputs: vec!["-".to_string()],
            devices: Vec::new(),
            replay: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`, or defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|err| ConfigError::io(path, err))?;
        let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ConfigError::io(parent, err))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(|err| ConfigError::io(path, err))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("evcapture")
            .join("config.json")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_after.is_zero() {
            return Err(ConfigError::Invalid("store_after must be at least one second".to_string()));
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::Invalid("worker_threads must be at least 1".to_string()));
        }
        if self.outputs.is_empty() {
            return Err(ConfigError::Invalid("at least one output is required".to_string()));
        }
        Ok(())
    }

    /// Pipeline parameters. A zero threshold would drain an empty buffer on
    /// every wake-up, so it is raised to one.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            worker_threads: self.worker_threads,
            threshold: self.store_n_events.max(1),
            interval: self.store_after,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("unsupported output {0}: no database engine is built in, use .json or .jsonl")]
    UnsupportedOutput(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store_n_events, 100);
        assert_eq!(config.store_after, Duration::from_secs(60));
        assert_eq!(config.outputs, vec!["-".to_string()]);
        assert!(config.devices.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"store_n_events": 5, "store_after": 2}"#).unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.store_n_events, 5);
        assert_eq!(config.store_after, Duration::from_secs(2));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            worker_threads: Some(3),
            outputs: vec!["capture.jsonl".to_string()],
            replay: vec![PathBuf::from("session.jsonl")],
            ..Config::default()
        };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"store_after": 0}"#).unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_pipeline_config_raises_zero_threshold() {
        let config = Config {
            store_n_events: 0,
            ..Config::default()
        };
        assert_eq!(config.pipeline_config().threshold, 1);
        assert_eq!(config.pipeline_config().worker_threads, None);
    }
}
