//! sonata::split
//!
//! Split one node population into per-value populations.
//!
//! # Architecture
//!
//! Nodes are partitioned by the distinct values of one attribute of group
//! `0`. Each partition becomes its own container `nodes_<value>` with ids
//! renumbered densely in original order. Edges are then re-derived per
//! ordered (source partition, target partition) pair that has at least one
//! edge, with endpoint ids rewritten to partition-local ids.
//!
//! Partitions and pairs are processed in sorted order, so the set of
//! written files is deterministic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::container::{AttrValue, Container, Data};
use crate::core::error::{CurateError, CurateResult};
use crate::core::ops::lock::ContainerLock;
use crate::core::paths;
use crate::core::types::{Category, PopulationName};
use crate::sonata::library::read_strings;
use crate::sonata::population::{
    compact_population, expect_category, population_size, resolve_population,
};

/// Type label of edge populations written by a split.
pub const SPLIT_EDGE_TYPE: &str = "chemical";

/// Files written by [`split_population`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitOutput {
    /// Node container per partition value.
    pub nodes: BTreeMap<String, PathBuf>,
    /// Edge container per (source, target) partition pair.
    pub edges: BTreeMap<(String, String), PathBuf>,
}

/// Attribute values of every node as text; numeric columns are formatted.
fn partition_keys(
    container: &Container,
    population: &str,
    attribute: &str,
) -> CurateResult<Vec<String>> {
    match read_strings(container, Category::Nodes, population, paths::DEFAULT_GROUP, attribute) {
        Err(CurateError::ShapeMismatch { .. }) => {
            let path = paths::attribute(Category::Nodes, population, paths::DEFAULT_GROUP, attribute);
            Ok(match &container.dataset(&path)?.data {
                Data::Int(v) => v.iter().map(i64::to_string).collect(),
                Data::Float(v) => v.iter().map(f64::to_string).collect(),
                Data::Text(v) => v.clone(),
            })
        }
        other => other,
    }
}

fn int_column(container: &Container, population: &str, column: &str) -> CurateResult<Vec<i64>> {
    let path = paths::population_column(Category::Edges, population, column);
    container
        .dataset(&path)
        .map_err(|_| CurateError::not_found("column", path.clone()))?
        .as_ints()
        .map(<[i64]>::to_vec)
        .ok_or_else(|| CurateError::invariant(path, "node ids are not integers"))
}

/// Copy `population` of `input` into a fresh container as `name`, keeping
/// only the rows in `keep`.
fn extract(
    input: &Container,
    category: Category,
    population: &str,
    name: &str,
    rows: usize,
    keep: &[usize],
) -> CurateResult<Container> {
    let node = input
        .node(&paths::population(category, population))
        .cloned()
        .ok_or_else(|| CurateError::not_found("population", population))?;
    let mut out = Container::new();
    out.put_node(&paths::population(category, name), node)?;
    compact_population(&mut out, category, name, rows, keep)?;
    Ok(out)
}

fn save_new(container: &Container, path: &Path) -> CurateResult<()> {
    let _lock = ContainerLock::acquire(path)?;
    container.save(path)?;
    Ok(())
}

/// Partition `nodes` by `attribute` and re-derive `edges` per partition
/// pair, writing everything into `out_dir`.
///
/// # Errors
///
/// - `NotFound` if the attribute is absent
/// - `InvalidName` if an attribute value cannot name a population
/// - `InvariantViolation` if an edge references a node outside `nodes`
pub fn split_population(
    out_dir: &Path,
    attribute: &str,
    nodes: &Path,
    edges: &Path,
) -> CurateResult<SplitOutput> {
    let node_input = Container::load(nodes)?;
    expect_category(&node_input, nodes, Category::Nodes)?;
    let node_population = resolve_population(&node_input, nodes, None)?;
    let node_count = population_size(&node_input, Category::Nodes, &node_population)?;
    let keys = partition_keys(&node_input, &node_population, attribute)?;
    if keys.len() != node_count {
        return Err(CurateError::ShapeMismatch {
            attribute: attribute.to_string(),
            message: format!("{} values for {} nodes", keys.len(), node_count),
        });
    }

    let mut partitions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (row, key) in keys.iter().enumerate() {
        partitions.entry(key.clone()).or_default().push(row);
    }
    for key in partitions.keys() {
        PopulationName::new(key.as_str())?;
    }

    let mut local = vec![(String::new(), 0i64); node_count];
    for (key, rows) in &partitions {
        for (local_id, &row) in rows.iter().enumerate() {
            local[row] = (key.clone(), local_id as i64);
        }
    }

    std::fs::create_dir_all(out_dir).map_err(|e| CurateError::io(out_dir, e))?;
    let mut output = SplitOutput::default();

    for (key, rows) in &partitions {
        let part = extract(&node_input, Category::Nodes, &node_population, key, node_count, rows)?;
        let path = paths::split_nodes_file(out_dir, key);
        save_new(&part, &path)?;
        tracing::debug!(partition = %key, nodes = rows.len(), "wrote node partition");
        output.nodes.insert(key.clone(), path);
    }

    let edge_input = Container::load(edges)?;
    expect_category(&edge_input, edges, Category::Edges)?;
    let edge_population = resolve_population(&edge_input, edges, None)?;
    let sources = int_column(&edge_input, &edge_population, paths::SOURCE_NODE_ID)?;
    let targets = int_column(&edge_input, &edge_population, paths::TARGET_NODE_ID)?;
    if sources.len() != targets.len() {
        return Err(CurateError::invariant(
            paths::population(Category::Edges, &edge_population),
            "source and target columns differ in length",
        ));
    }

    let lookup = |id: i64| -> CurateResult<(String, i64)> {
        usize::try_from(id)
            .ok()
            .and_then(|i| local.get(i))
            .cloned()
            .ok_or_else(|| {
                CurateError::invariant(
                    paths::population(Category::Edges, &edge_population),
                    format!("edge references node {} outside {} nodes", id, node_count),
                )
            })
    };

    let mut pairs: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for row in 0..sources.len() {
        let (source_part, _) = lookup(sources[row])?;
        let (target_part, _) = lookup(targets[row])?;
        pairs
            .entry((source_part, target_part))
            .or_default()
            .push(row);
    }

    for ((source_part, target_part), rows) in &pairs {
        let name = paths::edge_population_name(source_part, target_part, SPLIT_EDGE_TYPE);
        let mut part = extract(
            &edge_input,
            Category::Edges,
            &edge_population,
            &name,
            sources.len(),
            rows,
        )?;
        for (column, ids, partition) in [
            (paths::SOURCE_NODE_ID, &sources, source_part),
            (paths::TARGET_NODE_ID, &targets, target_part),
        ] {
            let renumbered = rows
                .iter()
                .map(|&row| lookup(ids[row]).map(|(_, local_id)| local_id))
                .collect::<CurateResult<Vec<i64>>>()?;
            let path = paths::population_column(Category::Edges, &name, column);
            part.dataset_mut(&path)?.data = Data::Int(renumbered);
            part.set_attr(
                &path,
                paths::NODE_POPULATION_ATTR,
                AttrValue::Text(partition.clone()),
            )?;
        }
        let path = paths::split_edges_file(out_dir, source_part, target_part);
        save_new(&part, &path)?;
        tracing::debug!(population = %name, edges = rows.len(), "wrote edge partition");
        output
            .edges
            .insert((source_part.clone(), target_part.clone()), path);
    }

    Ok(output)
}
