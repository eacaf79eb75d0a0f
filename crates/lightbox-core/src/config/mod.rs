//! Configuration management for Lightbox.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. All config structs implement `Default`.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::types::DerivedAssetSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Lightbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Work queue ceilings
    pub queues: QueueConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Dedup shortcut settings
    pub dedup: DedupConfig,

    /// Collection descriptor settings
    pub collection: CollectionConfig,

    /// External tool settings
    pub tools: ToolsConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Derived variants generated for every source item
    pub derived: Vec<DerivedAssetSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            queues: QueueConfig::default(),
            cache: CacheConfig::default(),
            dedup: DedupConfig::default(),
            collection: CollectionConfig::default(),
            tools: ToolsConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            derived: default_derived_assets(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.lightbox.lightbox/config.toml
    /// - Linux: ~/.config/lightbox/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\lightbox\config\config.toml
    ///
    /// Falls back to ~/.lightbox/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "lightbox", "lightbox")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".lightbox").join("config.toml")
            })
    }

    /// Get the resolved output directory (with ~ expansion).
    pub fn output_dir(&self) -> PathBuf {
        let path_str = self.general.output_dir.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
