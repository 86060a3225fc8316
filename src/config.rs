//! Board configuration
//!
//! Loaded from YAML; every field has a default so a partial file (or none at
//! all) is valid.

use crate::focus::DirtyPolicy;
use crate::gateway::SearchMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Extent used to scatter nodes that carry no persisted position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 500.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period before a query is sent
    pub debounce_ms: u64,
    pub mode: SearchMode,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            mode: SearchMode::Hybrid,
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Where the SQLite gateway keeps its data; unset paths fall back to the
/// platform data directory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: Option<PathBuf>,
    pub artifacts_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    /// Label given to edges drawn without one
    pub default_edge_label: String,
    pub search: SearchConfig,
    /// What focusing another node does to unsaved edits
    pub dirty_policy: DirtyPolicy,
    pub storage: StorageConfig,
    /// Buffer size of each store's event channel
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            default_edge_label: "related".to_string(),
            search: SearchConfig::default(),
            dirty_policy: DirtyPolicy::default(),
            storage: StorageConfig::default(),
            event_capacity: 64,
        }
    }
}

impl Config {
    /// Read a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(is_usable_extent(self.layout.width) && is_usable_extent(self.layout.height)) {
            return Err(ConfigError::Invalid(format!(
                "layout extent must be finite and positive, got {}x{}",
                self.layout.width, self.layout.height
            )));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    /// Database path, defaulting to `<data dir>/crazyboard/crazyboard.db`
    pub fn db_path(&self) -> PathBuf {
        self.storage
            .db_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("crazyboard.db"))
    }

    /// Artifact directory, defaulting to `<data dir>/crazyboard/artifacts`
    pub fn artifacts_dir(&self) -> PathBuf {
        self.storage
            .artifacts_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("artifacts"))
    }
}

fn default_data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("crazyboard")
}

/// A layout side length the board can scatter nodes across
pub(crate) fn is_usable_extent(side: f64) -> bool {
    side.is_finite() && side > 0.0
}
