//! population commands - List, rename, and annotate populations

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::core::container::Container;
use crate::sonata::population::{
    self as pop, category_of, get_population_name, get_population_names, AttributeValue,
};
use crate::ui::output;

/// Print the populations of a container, one per line.
pub fn population_names(ctx: &Context, file: &Path) -> Result<ExitCode> {
    let names = get_population_names(file)
        .with_context(|| format!("Failed to read populations of '{}'", file.display()))?;
    if names.is_empty() {
        output::warn(format!("'{}' holds no population", file.display()), ctx.verbosity);
    }
    for name in names {
        // Listing output is the command's result; print it even when quiet.
        println!("{}", name);
    }
    Ok(ExitCode::SUCCESS)
}

/// Rename a population in place.
pub fn rename_population(
    ctx: &Context,
    file: &Path,
    new_name: &str,
    old_name: Option<&str>,
) -> Result<ExitCode> {
    let renamed = pop::rename_population(file, new_name, old_name)
        .with_context(|| format!("Failed to rename population in '{}'", file.display()))?;
    output::success(
        format!("Renamed population to '{}' in {}", renamed, file.display()),
        ctx.verbosity,
    );
    Ok(ExitCode::SUCCESS)
}

/// Write an attribute column.
pub fn set_attribute(
    ctx: &Context,
    file: &Path,
    name: &str,
    values: &[String],
    population: Option<&str>,
    group: &str,
    overwrite: bool,
) -> Result<ExitCode> {
    let container = Container::load(file)
        .with_context(|| format!("Failed to load '{}'", file.display()))?;
    let category = category_of(&container, file)?;
    let population = get_population_name(file, population)?;
    let value = AttributeValue::parse_all(values);
    output::debug(format!("parsed value as {:?}", value), ctx.verbosity);

    pop::set_group_attribute(file, category, &population, group, name, value, overwrite)
        .with_context(|| {
            format!(
                "Failed to set '{}' on {}/{}/{}",
                name, category, population, group
            )
        })?;
    output::success(
        format!("Set {}/{}/{}/{}", category, population, group, name),
        ctx.verbosity,
    );
    Ok(ExitCode::SUCCESS)
}

/// Backfill a missing type-id column.
pub fn add_type_id(ctx: &Context, file: &Path, population: Option<&str>) -> Result<ExitCode> {
    let population = get_population_name(file, population)
        .with_context(|| format!("Failed to resolve population in '{}'", file.display()))?;
    if pop::add_type_id(file, &population)? {
        output::success(
            format!("Added type-id column to '{}'", population),
            ctx.verbosity,
        );
    } else {
        output::print(
            format!("'{}' already has a type-id column", population),
            ctx.verbosity,
        );
    }
    Ok(ExitCode::SUCCESS)
}
