//! Configuration module for folio.

use serde::Deserialize;
use std::path::Path;

use crate::{FolioError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/folio.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Assets configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetsConfig {
    /// Root directory every catalogued folder lives under.
    #[serde(default = "default_assets_root")]
    pub root: String,
    /// Name of the hidden per-folder directory holding derived artifacts.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

fn default_assets_root() -> String {
    "data/assets".to_string()
}

fn default_cache_dir() -> String {
    ".cache".to_string()
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: default_assets_root(),
            cache_dir: default_cache_dir(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file; console output is always enabled.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Assets configuration.
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FolioError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(s).map_err(|e| FolioError::Config(format!("parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FOLIO_DATABASE_PATH`: Override the database file
    /// - `FOLIO_ASSETS_ROOT`: Override the assets root
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FOLIO_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(root) = std::env::var("FOLIO_ASSETS_ROOT") {
            if !root.is_empty() {
                self.assets.root = root;
            }
        }
    }

    /// Validate the configuration.
    ///
    /// The cache directory must be a single plain directory name.
    pub fn validate(&self) -> Result<()> {
        let cache_dir = &self.assets.cache_dir;
        if cache_dir.is_empty()
            || cache_dir == "."
            || cache_dir == ".."
            || cache_dir.contains(['/', '\\'])
        {
            return Err(FolioError::Config(format!(
                "assets.cache_dir must be a plain directory name, got '{cache_dir}'"
            )));
        }
        Ok(())
    }
}
