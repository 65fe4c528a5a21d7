//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! the origin the study app is served from, the cache version tag, and the
//! network timeout applied before falling back to the cache.
//!
//! Configuration is stored at `~/.config/osteocache/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::offline::{CacheSettings, CACHE_VERSION, DEFAULT_NETWORK_TIMEOUT_SECS};

/// Application name used for config/data directory paths
const APP_NAME: &str = "osteocache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_ORIGIN: &str = "http://localhost:8080/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL the application shell and datasets are served from.
    pub origin: String,
    /// Cache bucket tag. Bump by hand when the manifest or cache logic changes.
    pub cache_version: String,
    pub network_timeout_secs: u64,
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            cache_version: CACHE_VERSION.to_string(),
            network_timeout_secs: DEFAULT_NETWORK_TIMEOUT_SECS,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_json(&contents)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse config file")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Directory of the durable progress slot.
    pub fn progress_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("progress"))
    }

    /// Root of the versioned cache buckets.
    pub fn caches_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("caches"))
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            network_timeout: Duration::from_secs(self.network_timeout_secs),
            ..CacheSettings::default()
        }
        .with_version(self.cache_version.clone())
    }
}
