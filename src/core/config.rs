//! Bridge configuration
//!
//! Loaded from RON or JSON; every field has a default so partial files work.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Worker loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of worker threads
    pub worker_count: usize,
    /// Worker thread name prefix
    pub thread_name: String,
    /// Maximum queued loads (None for unbounded)
    pub queue_capacity: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_count: std::thread::available_parallelism()
                .map_or(2, |n| n.get().min(4)),
            thread_name: String::from("model-loader"),
            queue_capacity: None,
        }
    }
}

impl LoaderConfig {
    /// Set the number of worker threads
    #[must_use]
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    /// Set the thread name prefix
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Bound the load queue. The capacity is at least one job.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity.max(1));
        self
    }
}

/// Where completions are applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchMode {
    /// On the loader thread that produced them
    #[default]
    Immediate,
    /// On the thread that drains the completion queue
    Queued,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Loader threads
    pub loader: LoaderConfig,
    /// Completion dispatch
    pub dispatch: DispatchMode,
    /// Default `env_logger` filter, used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            dispatch: DispatchMode::default(),
            log_filter: String::from("info"),
        }
    }
}

impl BridgeConfig {
    /// Set the loader configuration
    #[must_use]
    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    /// Set the dispatch mode
    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Set the default log filter
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Save the configuration to a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let ron_string = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        fs::write(path, ron_string).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load the configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        ron::from_str(&content).map_err(|e| ConfigError::DeserializeError(e.to_string()))
    }

    /// Save the configuration to a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json_string = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        fs::write(path, json_string).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Load the configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::DeserializeError(e.to_string()))
    }

    /// Load from a file, picking the format from its extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::load_json(path),
            _ => Self::load_ron(path),
        }
    }
}

/// Errors that can occur while reading or writing configuration
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// IO error
    IoError(String),
    /// Serialization error
    SerializeError(String),
    /// Deserialization error
    DeserializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => write!(f, "IO error: {e}"),
            Self::SerializeError(e) => write!(f, "Serialization error: {e}"),
            Self::DeserializeError(e) => write!(f, "Deserialization error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_ron_round_trip() {
        let config = BridgeConfig::default()
            .with_loader(LoaderConfig::default().with_workers(3).with_queue_capacity(16))
            .with_dispatch(DispatchMode::Queued);

        let ron_str = ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        assert!(ron_str.contains("Queued"));

        let loaded: BridgeConfig = ron::from_str(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let loaded: BridgeConfig =
            serde_json::from_str(r#"{ "loader": { "worker_count": 1 } }"#).unwrap();

        assert_eq!(loaded.loader.worker_count, 1);
        assert_eq!(loaded.loader.thread_name, "model-loader");
        assert_eq!(loaded.dispatch, DispatchMode::Immediate);
        assert_eq!(loaded.log_filter, "info");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("scene_bridge_config_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bridge.json");

        let config = BridgeConfig::default().with_log_filter("scene_bridge=debug");
        config.save_json(&path).unwrap();
        assert_eq!(BridgeConfig::load(&path).unwrap(), config);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_queue_capacity_is_at_least_one() {
        let config = LoaderConfig::default().with_queue_capacity(0);
        assert_eq!(config.queue_capacity, Some(1));
    }

    #[test]
    fn test_missing_file() {
        let result = BridgeConfig::load_ron("/nonexistent/bridge.ron");
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
