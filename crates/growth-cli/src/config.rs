//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default cache directory when neither flag, env nor config file set one
pub const DEFAULT_CACHE_DIR: &str = "model_cache";
/// Default training dataset
pub const DEFAULT_DATASET: &str = "data/stunting.csv";

/// CLI configuration, stored at `<config_dir>/growthctl/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Artifact cache directory
    pub cache_dir: Option<PathBuf>,
    /// Labeled CSV used for training
    pub dataset_path: Option<PathBuf>,
    /// Default output format ("table" or "json")
    pub default_format: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Save configuration to `path`
    #[allow(dead_code)]
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("growthctl").join("config.json"))
    }

    /// Flag/env value first, then the config file, then the built-in default
    pub fn resolve_cache_dir(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.cache_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    pub fn resolve_dataset(&self, flag: Option<PathBuf>) -> PathBuf {
        flag.or_else(|| self.dataset_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATASET))
    }
}
