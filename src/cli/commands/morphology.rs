//! morphology commands - Check and simplify morphology directories

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::paths;
use crate::morphology::check::{check_morphology_invariants, list_morphologies, load_morphdb};
use crate::morphology::simplify::{generate_updates, save_updates, write_new_morphs};
use crate::ui::output;

/// Exit status when a checked morphology fails an invariant.
const CHECK_FAILED: u8 = 1;

/// Check every morphology for ordering and unifurcations.
///
/// Names come from `--morphdb`, then the project `[check] morphdb`, then
/// the directory listing.
pub fn check_morphologies(ctx: &Context, morphs: &Path, morphdb: Option<&Path>) -> Result<ExitCode> {
    let morphdb = morphdb.map(Path::to_path_buf).or_else(|| ctx.config.morphdb());
    let names = match morphdb {
        Some(db) => {
            output::debug(format!("reading names from {}", db.display()), ctx.verbosity);
            load_morphdb(&db)
                .with_context(|| format!("Failed to read morphology database '{}'", db.display()))?
        }
        None => list_morphologies(morphs)
            .with_context(|| format!("Failed to list '{}'", morphs.display()))?,
    };

    let report = check_morphology_invariants(morphs, &names);

    let incorrect: Vec<_> = report.incorrect_ordering.iter().collect();
    let unifurcated: Vec<_> = report.have_unifurcations.iter().collect();
    if !incorrect.is_empty() {
        println!("Incorrect ordering ({}):", incorrect.len());
        println!("{}", output::format_list(&incorrect, "  "));
    }
    if !unifurcated.is_empty() {
        println!("Have unifurcations ({}):", unifurcated.len());
        println!("{}", output::format_list(&unifurcated, "  "));
    }
    for (name, reason) in &report.unreadable {
        output::error(format!("{}: {}", name, reason));
    }

    if report.is_clean() {
        output::success(
            format!("{} morphologies pass both checks", names.len()),
            ctx.verbosity,
        );
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(CHECK_FAILED))
    }
}

/// Remove unifurcations into a new directory and record the updates.
pub fn update_morphologies(ctx: &Context, morphs: &Path, out_dir: &Path) -> Result<ExitCode> {
    let updates = generate_updates(morphs)
        .with_context(|| format!("Failed to compute updates for '{}'", morphs.display()))?;
    let written = write_new_morphs(&updates, morphs, out_dir)
        .with_context(|| format!("Failed to write morphologies to '{}'", out_dir.display()))?;
    let artifact = out_dir.join(paths::UPDATES_FILE);
    save_updates(&artifact, &updates)
        .with_context(|| format!("Failed to write '{}'", artifact.display()))?;

    output::success(
        format!(
            "Wrote {} morphologies ({} simplified) to {}",
            written,
            updates.len(),
            out_dir.display()
        ),
        ctx.verbosity,
    );
    output::print(format!("Update record: {}", artifact.display()), ctx.verbosity);
    Ok(ExitCode::SUCCESS)
}
