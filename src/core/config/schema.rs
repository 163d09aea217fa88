//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `--config <path>` on the command line
//! 2. `$SONATAKIT_CONFIG` if set
//! 3. `$XDG_CONFIG_HOME/sonatakit/config.toml`
//! 4. `~/.sonatakit/config.toml` (canonical write location)
//!
//! # Project Config
//!
//! Located at `.sonatakit/config.toml` in the working directory.
//!
//! # Validation
//!
//! Config values are validated after parsing (population names must be
//! usable as container path components, labels must be non-empty).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::PopulationName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// default_population = "default"
/// edge_type_label = "chemical"
/// log_filter = "sonatakit=info"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Population name used when a command needs one and none is given
    pub default_population: Option<String>,

    /// Type label used when rewiring edge populations
    pub edge_type_label: Option<String>,

    /// `tracing` filter directive used when `--debug` is not given
    pub log_filter: Option<String>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_population(self.default_population.as_deref())?;
        validate_label(self.edge_type_label.as_deref())
    }
}

/// Project configuration.
///
/// # Example
///
/// ```toml
/// default_population = "hippocampus_neurons"
///
/// [check]
/// morphdb = "morphologies/neurondbExt.dat"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Population name used when a command needs one and none is given
    pub default_population: Option<String>,

    /// Type label used when rewiring edge populations
    pub edge_type_label: Option<String>,

    /// Morphology check defaults
    pub check: Option<CheckConfig>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_population(self.default_population.as_deref())?;
        validate_label(self.edge_type_label.as_deref())
    }
}

/// Defaults for `check-morphologies`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CheckConfig {
    /// Morphology database listing the names to check
    pub morphdb: Option<PathBuf>,
}

fn validate_population(name: Option<&str>) -> Result<(), ConfigError> {
    if let Some(name) = name {
        PopulationName::new(name).map_err(|e| {
            ConfigError::InvalidValue(format!("invalid default_population: {}", e))
        })?;
    }
    Ok(())
}

fn validate_label(label: Option<&str>) -> Result<(), ConfigError> {
    if let Some(label) = label {
        if label.is_empty() || label.contains('/') {
            return Err(ConfigError::InvalidValue(format!(
                "invalid edge_type_label '{}'",
                label
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_parses() {
        let config: GlobalConfig = toml::from_str(
            r#"
            default_population = "default"
            edge_type_label = "electrical"
            "#,
        )
        .unwrap();
        assert_eq!(config.edge_type_label.as_deref(), Some("electrical"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn project_check_section_parses() {
        let config: ProjectConfig = toml::from_str(
            r#"
            [check]
            morphdb = "db.dat"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.check.unwrap().morphdb,
            Some(PathBuf::from("db.dat"))
        );
    }

    #[test]
    fn invalid_population_rejected() {
        let config = GlobalConfig {
            default_population: Some("a/b".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_label_rejected() {
        let config = ProjectConfig {
            edge_type_label: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        let parsed: Result<GlobalConfig, _> = toml::from_str("morphology_dir = \"morphs\"");
        assert!(parsed.is_err());
    }
}
