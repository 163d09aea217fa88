//! cli
//!
//! Command-line interface layer for sonatakit.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and initialize logging
//! - Delegate to command handlers
//! - Does NOT touch containers directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! library operations in [`crate::sonata`], [`crate::morphology`], and
//! [`crate::reindex`]. Every container change flows through those
//! operations and their lock-and-atomic-save protocol.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::core::config::Config;
use crate::ui::output::{self, Verbosity};

/// Execution context shared by command handlers.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory used to resolve the project config.
    pub cwd: PathBuf,
    /// Output verbosity derived from `--quiet`/`--debug`.
    pub verbosity: Verbosity,
    /// Merged configuration.
    pub config: Config,
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`. The returned exit
/// code is nonzero when a diagnostic command finds problems; operational
/// failures are returned as errors.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse_args();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);

    let cwd = match cli.cwd.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine working directory")?,
    };
    let config =
        Config::load(Some(&cwd), cli.config.as_deref()).context("Failed to load config")?;

    output::init_logging(verbosity, config.log_filter());
    if let Some(path) = config.global_config_loaded_from() {
        tracing::debug!(path = %path.display(), "loaded global config");
    }
    if let Some(path) = config.project_config_loaded_from() {
        tracing::debug!(path = %path.display(), "loaded project config");
    }

    let ctx = Context {
        cwd,
        verbosity,
        config,
    };

    // Dispatch to command handler
    commands::dispatch(cli.command, &ctx)
}
