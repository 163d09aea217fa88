//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! sonatakit has two configuration scopes:
//! - **Global**: User-level settings
//! - **Project**: Settings for one circuit-building directory
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. Explicit path (the `--config` flag)
//! 2. `$SONATAKIT_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/sonatakit/config.toml`
//! 4. `~/.sonatakit/config.toml` (canonical write location)
//!
//! # Project Config Location
//!
//! `.sonatakit/config.toml` under the project directory.
//!
//! # Example
//!
//! ```no_run
//! use sonatakit::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/circuit")), None).unwrap();
//! println!("Population: {}", config.default_population());
//! println!("Edge type: {}", config.edge_type_label());
//! ```

pub mod schema;

pub use schema::{CheckConfig, GlobalConfig, ProjectConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Environment variable naming an explicit global config file.
pub const CONFIG_ENV: &str = "SONATAKIT_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {message}")]
    WriteError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence rules automatically: project config
/// overrides global config, which overrides built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if present)
    pub project: Option<ProjectConfig>,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Path to the project config file (if loaded)
    project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// `explicit` replaces the global search when given; a missing explicit
    /// file is an error, missing default files are not.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or
    /// fail validation.
    pub fn load(project_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Config, ConfigError> {
        let (global, global_path) = match explicit {
            Some(path) => (read_toml::<GlobalConfig>(path)?, Some(path.to_path_buf())),
            None => Self::load_global()?,
        };

        let (project, project_path) = match project_dir {
            Some(dir) => {
                let path = Self::project_config_path(dir);
                if path.exists() {
                    (Some(read_toml::<ProjectConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        Ok(Config {
            global,
            project,
            global_path,
            project_path,
        })
    }

    /// Load global configuration from standard locations.
    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok((read_toml(&path)?, Some(path)));
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("sonatakit/config.toml");
            if path.exists() {
                return Ok((read_toml(&path)?, Some(path)));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".sonatakit/config.toml");
            if path.exists() {
                return Ok((read_toml(&path)?, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    /// Get the canonical path for global config (`~/.sonatakit/config.toml`).
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".sonatakit/config.toml"))
    }

    /// Get the path for project config under `dir`.
    pub fn project_config_path(dir: &Path) -> PathBuf {
        dir.join(".sonatakit/config.toml")
    }

    /// Write project config atomically.
    pub fn write_project(dir: &Path, config: &ProjectConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = Self::project_config_path(dir);
        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        crate::core::container::io::write_atomic(&path, contents.as_bytes()).map_err(|e| {
            ConfigError::WriteError {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Population name used when none is given.
    ///
    /// Defaults to `"default"`.
    pub fn default_population(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.default_population.as_deref())
            .or(self.global.default_population.as_deref())
            .unwrap_or("default")
    }

    /// Type label for rewired edge populations.
    ///
    /// Defaults to `"chemical"`.
    pub fn edge_type_label(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.edge_type_label.as_deref())
            .or(self.global.edge_type_label.as_deref())
            .unwrap_or("chemical")
    }

    /// Morphology database for `check-morphologies`, resolved against the
    /// project directory.
    pub fn morphdb(&self) -> Option<PathBuf> {
        let db = self.project.as_ref()?.check.as_ref()?.morphdb.as_ref()?;
        let base = self
            .project_path
            .as_ref()
            .and_then(|p| p.parent())
            .and_then(|p| p.parent());
        Some(match base {
            Some(base) if db.is_relative() => base.join(db),
            _ => db.clone(),
        })
    }

    /// `tracing` filter directive used without `--debug`.
    ///
    /// Defaults to `"warn"`.
    pub fn log_filter(&self) -> &str {
        self.global.log_filter.as_deref().unwrap_or("warn")
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

/// Read and parse a TOML config file.
fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
