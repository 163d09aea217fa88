//! config command - Get, set, or list configuration values

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::{CheckConfig, Config};
use crate::ui::output;

const KEYS: [&str; 4] = [
    "default_population",
    "edge_type_label",
    "log_filter",
    "check.morphdb",
];

/// Effective value of `key`, or `None` when unset and without a default.
fn lookup(config: &Config, key: &str) -> Result<Option<String>> {
    Ok(match key {
        "default_population" => Some(config.default_population().to_string()),
        "edge_type_label" => Some(config.edge_type_label().to_string()),
        "log_filter" => Some(config.log_filter().to_string()),
        "check.morphdb" => config.morphdb().map(|p| p.display().to_string()),
        _ => bail!("Unknown configuration key: {}", key),
    })
}

/// Get a configuration value.
pub fn get(ctx: &Context, key: &str) -> Result<ExitCode> {
    if let Some(value) = lookup(&ctx.config, key)? {
        println!("{}", value);
    }
    Ok(ExitCode::SUCCESS)
}

/// Set a project configuration value under the working directory.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<ExitCode> {
    let mut project = ctx.config.project.clone().unwrap_or_default();
    match key {
        "default_population" => project.default_population = Some(value.to_string()),
        "edge_type_label" => project.edge_type_label = Some(value.to_string()),
        "check.morphdb" => {
            project
                .check
                .get_or_insert_with(CheckConfig::default)
                .morphdb = Some(PathBuf::from(value));
        }
        "log_filter" => {
            let path = Config::global_config_path()?;
            bail!(
                "'log_filter' is a global key; set it in {}",
                path.display()
            );
        }
        _ => bail!("Unknown configuration key: {}", key),
    }

    let path = Config::write_project(&ctx.cwd, &project).context("Failed to write config")?;
    output::success(format!("Set {} = {}", key, value), ctx.verbosity);
    output::debug(format!("wrote {}", path.display()), ctx.verbosity);
    Ok(ExitCode::SUCCESS)
}

/// List all configuration values.
pub fn list(ctx: &Context) -> Result<ExitCode> {
    match ctx.config.global_config_loaded_from() {
        Some(path) => println!("# global: {}", path.display()),
        None => println!("# global: (defaults)"),
    }
    if let Some(path) = ctx.config.project_config_loaded_from() {
        println!("# project: {}", path.display());
    }
    for key in KEYS {
        match lookup(&ctx.config, key)? {
            Some(value) => println!("{} = {}", key, value),
            None => println!("{} = (not set)", key),
        }
    }
    Ok(ExitCode::SUCCESS)
}
