//! sonata::curate
//!
//! Population-level curation operations on node and edge containers.
//!
//! # Operations
//!
//! - [`rewire_edge_population`]: name an edge population after the node
//!   populations it connects
//! - [`create_projection_source_nodes`]: synthesize a virtual node
//!   population for the sources of a projection
//! - [`correct_source_nodes_offset`]: shift projection source ids back to
//!   a zero-based range
//! - [`merge_h5_files`]: concatenate populations from several containers
//!
//! Every operation that mutates an existing file goes through
//! [`edit_container`](super::population::edit_container), so a failure
//! leaves the file as it was.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::container::{AttrValue, Container, Data, Dataset};
use crate::core::error::{CurateError, CurateResult};
use crate::core::ops::lock::ContainerLock;
use crate::core::paths;
use crate::core::types::{Category, PopulationName};
use crate::sonata::library::write_categorical;
use crate::sonata::population::{
    category_of, compact_population, edit_container, expect_category, get_population_name,
    rename_in, resolve_population, TYPE_ID_SENTINEL,
};

/// Model type of synthesized projection source nodes.
pub const VIRTUAL_MODEL_TYPE: &str = "virtual";

/// Rename the sole edge population to `"{source}__{target}__{type_label}"`
/// and stamp `node_population` on both endpoint columns.
///
/// Returns the new edge population name.
///
/// # Errors
///
/// Fails with `AmbiguousPopulation` if either node file holds more than one
/// population, or if the edge file does.
pub fn rewire_edge_population(
    edges: &Path,
    source_nodes: &Path,
    target_nodes: &Path,
    type_label: &str,
) -> CurateResult<String> {
    let source = get_population_name(source_nodes, None)?;
    let target = get_population_name(target_nodes, None)?;
    let new_name = paths::edge_population_name(&source, &target, type_label);

    edit_container(edges, |c| {
        expect_category(c, edges, Category::Edges)?;
        let renamed = rename_in(c, edges, &new_name, None)?;
        for (column, population) in [
            (paths::SOURCE_NODE_ID, &source),
            (paths::TARGET_NODE_ID, &target),
        ] {
            c.set_attr(
                &paths::population_column(Category::Edges, &renamed, column),
                paths::NODE_POPULATION_ATTR,
                AttrValue::Text(population.clone()),
            )?;
        }
        tracing::debug!(edges = %edges.display(), population = %renamed, "rewired edge population");
        Ok(renamed)
    })
}

pub(crate) fn source_ids(container: &Container, population: &str) -> CurateResult<Vec<i64>> {
    let path = paths::population_column(Category::Edges, population, paths::SOURCE_NODE_ID);
    container
        .dataset(&path)
        .map_err(|_| CurateError::not_found("column", path.clone()))?
        .as_ints()
        .map(<[i64]>::to_vec)
        .ok_or_else(|| CurateError::invariant(path, "node ids are not integers"))
}

/// Synthesize `out_dir/nodes_{population_name}` from the sources of an edge
/// file's single population.
///
/// Without `fix_offset` source ids are taken as-is, so the population has
/// `max(source_node_id) + 1` nodes and `model_type` is Library-encoded.
/// With `fix_offset` it holds one node per distinct source id and
/// `model_type` is a raw text column, marking ids that still need
/// [`correct_source_nodes_offset`].
///
/// Returns the path of the written container.
pub fn create_projection_source_nodes(
    edges: &Path,
    out_dir: &Path,
    population_name: &str,
    fix_offset: bool,
) -> CurateResult<PathBuf> {
    let population = PopulationName::new(population_name)?;
    let input = Container::load(edges)?;
    expect_category(&input, edges, Category::Edges)?;
    let edge_population = resolve_population(&input, edges, None)?;
    let ids = source_ids(&input, &edge_population)?;

    if ids.iter().any(|&id| id < 0) {
        return Err(CurateError::invariant(
            paths::population(Category::Edges, &edge_population),
            "negative source node id",
        ));
    }
    let size = if fix_offset {
        ids.iter().collect::<BTreeSet<_>>().len()
    } else {
        ids.iter().max().map(|&m| m as usize + 1).unwrap_or(0)
    };

    let mut nodes = Container::new();
    let name = population.as_str();
    nodes.put_dataset(
        &paths::population_column(Category::Nodes, name, Category::Nodes.type_id_column()),
        Dataset::ints(vec![TYPE_ID_SENTINEL; size]),
    )?;
    let model_type = vec![VIRTUAL_MODEL_TYPE.to_string(); size];
    if fix_offset {
        nodes.put_dataset(
            &paths::attribute(Category::Nodes, name, paths::DEFAULT_GROUP, "model_type"),
            Dataset::texts(model_type),
        )?;
    } else {
        write_categorical(
            &mut nodes,
            Category::Nodes,
            name,
            paths::DEFAULT_GROUP,
            "model_type",
            &model_type,
        )?;
    }

    std::fs::create_dir_all(out_dir).map_err(|e| CurateError::io(out_dir, e))?;
    let output = paths::projection_nodes_file(out_dir, name);
    let _lock = ContainerLock::acquire(&output)?;
    nodes.save(&output)?;
    tracing::debug!(output = %output.display(), size, fix_offset, "created projection source nodes");
    Ok(output)
}

/// Subtract `offset` from every `source_node_id`, dropping rows whose id
/// would become negative.
///
/// All per-row columns, population-level and per-group, are compacted to
/// the retained rows in their original order. `edge_group_index` is
/// recomputed and stale `indices` groups are removed.
///
/// Returns the number of retained rows.
pub fn correct_source_nodes_offset(
    edges: &Path,
    population: Option<&str>,
    offset: i64,
) -> CurateResult<usize> {
    edit_container(edges, |c| {
        expect_category(c, edges, Category::Edges)?;
        let population = resolve_population(c, edges, population)?;
        correct_offset_in(c, &population, offset)
    })
}

pub(crate) fn correct_offset_in(
    container: &mut Container,
    population: &str,
    offset: i64,
) -> CurateResult<usize> {
    let ids = source_ids(container, population)?;
    let mut keep = Vec::with_capacity(ids.len());
    let mut shifted = Vec::with_capacity(ids.len());
    for (row, &id) in ids.iter().enumerate() {
        match id.checked_sub(offset) {
            Some(new_id) if new_id >= 0 => {
                keep.push(row);
                shifted.push(new_id);
            }
            Some(_) => {}
            // Below i64::MIN: negative, so dropped.
            None if offset > 0 => {}
            None => {
                return Err(CurateError::invariant(
                    population,
                    format!("source id {} minus offset {} overflows", id, offset),
                ))
            }
        }
    }

    compact_population(container, Category::Edges, population, ids.len(), &keep)?;
    let source = container.dataset_mut(&paths::population_column(
        Category::Edges,
        population,
        paths::SOURCE_NODE_ID,
    ))?;
    source.data = Data::Int(shifted);
    source.shape = vec![keep.len()];

    let dropped = ids.len() - keep.len();
    if dropped > 0 {
        tracing::warn!(population, offset, dropped, "dropped rows with negative source ids");
    }
    tracing::debug!(population, offset, retained = keep.len(), "corrected source node offset");
    Ok(keep.len())
}

/// Concatenate the populations of `files` into a new container at `output`.
///
/// Returns the merged population names, sorted.
///
/// # Errors
///
/// - `AlreadyExists` if `output` exists
/// - `Schema` if an input is not of `category`
/// - `DuplicatePopulation` if two inputs share a population name
pub fn merge_h5_files(files: &[PathBuf], category: Category, output: &Path) -> CurateResult<Vec<String>> {
    if output.exists() {
        return Err(CurateError::AlreadyExists(format!(
            "output '{}'",
            output.display()
        )));
    }
    let mut merged = Container::new();
    merged.create_group(category.group_name())?;

    for file in files {
        let input = Container::load(file)?;
        let found = category_of(&input, file)?;
        if found != category {
            return Err(CurateError::schema(
                file,
                format!("expected a {} container, found {}", category, found),
            ));
        }
        let group = input.group(category.group_name())?;
        for (name, node) in &group.children {
            let destination = paths::population(category, name);
            if merged.contains(&destination) {
                return Err(CurateError::DuplicatePopulation {
                    category: category.to_string(),
                    name: name.clone(),
                });
            }
            merged.put_node(&destination, node.clone())?;
            tracing::debug!(input = %file.display(), population = %name, "merged population");
        }
    }

    let _lock = ContainerLock::acquire(output)?;
    merged.save(output)?;
    Ok(merged.child_names(category.group_name())?)
}
