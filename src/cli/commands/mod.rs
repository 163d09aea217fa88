//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Fills unset arguments from the merged config
//! 2. Calls one library operation
//! 3. Formats and displays output
//!
//! Handlers do NOT edit containers directly. Library errors are wrapped
//! with `anyhow` context naming the file involved.

mod config_cmd;
mod curate;
mod edges;
mod morphology;
mod population;

pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use curate::{correct_offset, merge, projection_source_nodes, rewire_edges, split_population};
pub use edges::{update_edge_pos, update_edge_population};
pub use morphology::{check_morphologies, update_morphologies};
pub use population::{add_type_id, population_names, rename_population, set_attribute};

use std::process::ExitCode;

use anyhow::Result;

use crate::cli::args::{Command, ConfigAction};
use crate::cli::Context;

/// Dispatch a command to its handler.
///
/// Commands that only mutate return success on completion; diagnostic
/// commands choose their own exit code.
pub fn dispatch(command: Command, ctx: &Context) -> Result<ExitCode> {
    match command {
        // Populations
        Command::PopulationNames { file } => population::population_names(ctx, &file),
        Command::RenamePopulation {
            file,
            new_name,
            old_name,
        } => population::rename_population(ctx, &file, &new_name, old_name.as_deref()),
        Command::SetAttribute {
            file,
            name,
            values,
            population,
            group,
            overwrite,
        } => population::set_attribute(
            ctx,
            &file,
            &name,
            &values,
            population.as_deref(),
            &group,
            overwrite,
        ),
        Command::AddTypeId { file, population } => {
            population::add_type_id(ctx, &file, population.as_deref())
        }

        // Curation
        Command::RewireEdges {
            edges,
            source_nodes,
            target_nodes,
            type_label,
        } => curate::rewire_edges(
            ctx,
            &edges,
            &source_nodes,
            &target_nodes,
            type_label.as_deref(),
        ),
        Command::ProjectionSourceNodes {
            edges,
            output,
            population,
            fix_offset,
        } => curate::projection_source_nodes(
            ctx,
            &edges,
            &output,
            population.as_deref(),
            fix_offset,
        ),
        Command::CorrectOffset {
            edges,
            offset,
            population,
        } => curate::correct_offset(ctx, &edges, offset, population.as_deref()),
        Command::Merge {
            category,
            output,
            files,
        } => curate::merge(ctx, category.into(), &output, &files),
        Command::SplitPopulation {
            output,
            attribute,
            nodes,
            edges,
        } => curate::split_population(ctx, &output, &attribute, &nodes, &edges),

        // Morphologies
        Command::CheckMorphologies { morphs, morphdb } => {
            morphology::check_morphologies(ctx, &morphs, morphdb.as_deref())
        }
        Command::UpdateMorphologies { morphs, output } => {
            morphology::update_morphologies(ctx, &morphs, &output)
        }
        Command::UpdateEdgePopulation {
            updates,
            nodes,
            population,
            edges,
        } => edges::update_edge_population(ctx, &updates, &nodes, &population, &edges),
        Command::UpdateEdgePos {
            morphs,
            nodes,
            population,
            edges,
        } => edges::update_edge_pos(ctx, &morphs, &nodes, &population, &edges),

        // Configuration
        Command::Config { action } => match action {
            ConfigAction::Get { key } => config_cmd::get(ctx, &key),
            ConfigAction::Set { key, value } => config_cmd::set(ctx, &key, &value),
            ConfigAction::List => config_cmd::list(ctx),
        },
    }
}
