//! curate commands - Rewire, synthesize, offset, merge, and split populations

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::container::Container;
use crate::core::types::Category;
use crate::sonata::{curate, split};
use crate::ui::output;

/// Print the content fingerprint of a written container in debug mode.
fn debug_fingerprint(ctx: &Context, path: &Path) {
    if let Ok(fingerprint) = Container::load(path).and_then(|c| c.fingerprint()) {
        output::debug(
            format!("{} fingerprint {}", path.display(), fingerprint),
            ctx.verbosity,
        );
    }
}

/// Name an edge population after the node populations it connects.
pub fn rewire_edges(
    ctx: &Context,
    edges: &Path,
    source_nodes: &Path,
    target_nodes: &Path,
    type_label: Option<&str>,
) -> Result<ExitCode> {
    let type_label = type_label.unwrap_or_else(|| ctx.config.edge_type_label());
    let name = curate::rewire_edge_population(edges, source_nodes, target_nodes, type_label)
        .with_context(|| format!("Failed to rewire '{}'", edges.display()))?;
    debug_fingerprint(ctx, edges);
    output::success(format!("Edge population is now '{}'", name), ctx.verbosity);
    Ok(ExitCode::SUCCESS)
}

/// Create a virtual node population for projection sources.
pub fn projection_source_nodes(
    ctx: &Context,
    edges: &Path,
    out_dir: &Path,
    population: Option<&str>,
    fix_offset: bool,
) -> Result<ExitCode> {
    let population = population.unwrap_or_else(|| ctx.config.default_population());
    let written = curate::create_projection_source_nodes(edges, out_dir, population, fix_offset)
        .with_context(|| format!("Failed to create source nodes from '{}'", edges.display()))?;
    debug_fingerprint(ctx, &written);
    output::success(format!("Wrote {}", written.display()), ctx.verbosity);
    if fix_offset {
        output::print(
            "Source ids keep their offset; run correct-offset on the edges next",
            ctx.verbosity,
        );
    }
    Ok(ExitCode::SUCCESS)
}

/// Shift source node ids down by `offset`.
pub fn correct_offset(
    ctx: &Context,
    edges: &Path,
    offset: i64,
    population: Option<&str>,
) -> Result<ExitCode> {
    let kept = curate::correct_source_nodes_offset(edges, population, offset)
        .with_context(|| format!("Failed to correct offset in '{}'", edges.display()))?;
    debug_fingerprint(ctx, edges);
    output::success(
        format!("Subtracted {} from source ids; {} edges kept", offset, kept),
        ctx.verbosity,
    );
    Ok(ExitCode::SUCCESS)
}

/// Merge the populations of several containers.
pub fn merge(ctx: &Context, category: Category, destination: &Path, files: &[PathBuf]) -> Result<ExitCode> {
    let names = curate::merge_h5_files(files, category, destination)
        .with_context(|| format!("Failed to merge into '{}'", destination.display()))?;
    debug_fingerprint(ctx, destination);
    output::success(
        format!(
            "Merged {} {} populations into {}",
            names.len(),
            category,
            destination.display()
        ),
        ctx.verbosity,
    );
    output::print(output::format_list(&names, "  "), ctx.verbosity);
    Ok(ExitCode::SUCCESS)
}

/// Split a node population and its edges by attribute value.
pub fn split_population(
    ctx: &Context,
    out_dir: &Path,
    attribute: &str,
    nodes: &Path,
    edges: &Path,
) -> Result<ExitCode> {
    let written = split::split_population(out_dir, attribute, nodes, edges).with_context(|| {
        format!(
            "Failed to split '{}' by '{}'",
            nodes.display(),
            attribute
        )
    })?;
    output::success(
        format!(
            "Wrote {} node and {} edge containers to {}",
            written.nodes.len(),
            written.edges.len(),
            out_dir.display()
        ),
        ctx.verbosity,
    );
    for path in written.nodes.values().chain(written.edges.values()) {
        output::debug(path.display(), ctx.verbosity);
    }
    Ok(ExitCode::SUCCESS)
}
