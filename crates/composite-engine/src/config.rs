//! Engine configuration
//!
//! Host-tunable defaults for validation and execution, stored as a JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::types::{CompositeGraph, Settings};

/// Defaults applied by a [`Composite`](crate::Composite)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Settings used when a graph declares none
    #[serde(default)]
    pub default_settings: Settings,
    /// Unknown node types are errors instead of warnings
    #[serde(default)]
    pub strict_mode: bool,
    /// Verify export/re-import equality when loading documents
    #[serde(default = "default_check_round_trip")]
    pub check_round_trip: bool,
    /// Cap on concurrently running nodes when a graph runs in parallel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

fn default_check_round_trip() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_settings: Settings::default(),
            strict_mode: false,
            check_round_trip: default_check_round_trip(),
            max_concurrency: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `path`; a missing file yields the defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            log::debug!("No engine config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await.map_err(ConfigError::Io)?;
        Self::from_json_str(&contents)
    }

    /// Save configuration to `path`, creating parent directories
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(ConfigError::Io)?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, contents).await.map_err(ConfigError::Io)?;

        log::info!("Engine configuration saved to {:?}", path);
        Ok(())
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(ConfigError::Parse)
    }

    /// Settings a run of `graph` uses
    pub fn settings_for(&self, graph: &CompositeGraph) -> Settings {
        graph.effective_settings(&self.default_settings)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.check_round_trip);
        assert!(!config.strict_mode);
        assert_eq!(config.default_settings.max_attempts(), 1);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"strictMode": true, "maxConcurrency": 4}"#).unwrap();
        assert!(config.strict_mode);
        assert!(config.check_round_trip);
        assert_eq!(config.max_concurrency, Some(4));
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_graph_settings_take_precedence() {
        let config = EngineConfig {
            default_settings: Settings {
                retries: 3,
                ..Settings::default()
            },
            ..EngineConfig::default()
        };
        let mut graph = CompositeGraph::new("g", "G");
        assert_eq!(config.settings_for(&graph).retries, 3);

        graph.settings = Some(Settings {
            parallel: true,
            ..Settings::default()
        });
        let settings = config.settings_for(&graph);
        assert!(settings.parallel);
        assert_eq!(settings.retries, 0);
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load(dir.path().join("engine.json")).await.unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.json");
        let config = EngineConfig {
            strict_mode: true,
            check_round_trip: false,
            max_concurrency: Some(2),
            default_settings: Settings {
                timeout: Some(5000),
                retries: 1,
                parallel: true,
            },
        };

        config.save(&path).await.unwrap();
        let loaded = EngineConfig::load(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}
