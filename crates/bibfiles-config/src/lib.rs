//! # bibfiles-config
//!
//! Configuration for the bibfiles library manager.
//!
//! Loads configuration from:
//! 1. `~/.bibfiles/config.toml` (global)
//! 2. `.bibfiles/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub migrate: MigrateConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global config (~/.bibfiles/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                let contents = std::fs::read_to_string(&global_path)?;
                config = toml::from_str(&contents)?;
            }
        }

        // 2. Project-local config (.bibfiles/config.toml)
        let project_path = Path::new(".bibfiles/config.toml");
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            let contents = std::fs::read_to_string(project_path)?;
            config = toml::from_str(&contents)?;
        }

        // 3. Environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    /// Global config path: ~/.bibfiles/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".bibfiles/config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("BIBFILES_LIBRARY") {
            self.storage.library_root = PathBuf::from(path);
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap()
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Library root: blobs under `files/`, aliases under `papers/`
    pub library_root: PathBuf,
    /// Catalog document, relative to the library root when not absolute
    pub catalog_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            library_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".bibfiles/library"),
            catalog_file: PathBuf::from("catalog.json"),
        }
    }
}

impl StorageConfig {
    /// Catalog path resolved against the library root.
    pub fn catalog_path(&self) -> PathBuf {
        if self.catalog_file.is_absolute() {
            self.catalog_file.clone()
        } else {
            self.library_root.join(&self.catalog_file)
        }
    }
}

/// Migration tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Chunk size, in bytes, for streaming content hashes
    pub hash_buffer_size: usize,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            hash_buffer_size: 64 * 1024,
        }
    }
}
