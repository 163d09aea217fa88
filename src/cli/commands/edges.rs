//! edge commands - Remap synapse references and write section positions

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::morphology::simplify::load_updates;
use crate::reindex::{apply_edge_updates, load_morphology_names, write_sonata_pos};
use crate::ui::output;

fn morphology_names(nodes: &Path) -> Result<Vec<String>> {
    load_morphology_names(nodes, None)
        .with_context(|| format!("Failed to read morphologies of '{}'", nodes.display()))
}

/// Remap synapse references of every edge file using an update record.
pub fn update_edge_population(
    ctx: &Context,
    updates: &Path,
    nodes: &Path,
    population: &str,
    edges: &[PathBuf],
) -> Result<ExitCode> {
    let updates = load_updates(updates)
        .with_context(|| format!("Failed to read update record '{}'", updates.display()))?;
    let morphology_by_cell = morphology_names(nodes)?;

    for file in edges {
        let rewritten = apply_edge_updates(&morphology_by_cell, file, &updates, population)
            .with_context(|| format!("Failed to update '{}'", file.display()))?;
        output::success(
            format!("{}: {} references remapped", file.display(), rewritten),
            ctx.verbosity,
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Write afferent/efferent section positions into every edge file.
pub fn update_edge_pos(
    ctx: &Context,
    morphs: &Path,
    nodes: &Path,
    population: &str,
    edges: &[PathBuf],
) -> Result<ExitCode> {
    let morphology_by_cell = morphology_names(nodes)?;

    for file in edges {
        let written = write_sonata_pos(morphs, &morphology_by_cell, population, file)
            .with_context(|| format!("Failed to write positions into '{}'", file.display()))?;
        output::success(
            format!("{}: {} positions written", file.display(), written),
            ctx.verbosity,
        );
    }
    Ok(ExitCode::SUCCESS)
}
