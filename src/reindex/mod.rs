//! reindex
//!
//! Apply morphology update records to synapse references and derive
//! normalized section positions.
//!
//! # Synapse Columns
//!
//! Synapse references live in edge group `0`, one triple per side:
//!
//! ```text
//! afferent_section_id, afferent_segment_id, afferent_segment_offset   (target cell)
//! efferent_section_id, efferent_segment_id, efferent_segment_offset   (source cell)
//! ```
//!
//! The afferent side is required; the efferent side is handled only when
//! its columns exist.

pub mod position;
pub mod remap;

pub use position::write_sonata_pos;
pub use remap::{apply_edge_updates, load_morphology_names};

use crate::core::container::{Container, Data};
use crate::core::error::{CurateError, CurateResult};
use crate::core::paths;
use crate::core::types::Category;
use crate::sonata::population::group_addresses;

/// Which end of a synapse a reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Post-synaptic, resolved through `target_node_id`.
    Afferent,
    /// Pre-synaptic, resolved through `source_node_id`.
    Efferent,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Afferent, Side::Efferent];

    pub fn prefix(self) -> &'static str {
        match self {
            Side::Afferent => "afferent",
            Side::Efferent => "efferent",
        }
    }

    /// Population column holding the cell each reference belongs to.
    pub fn node_column(self) -> &'static str {
        match self {
            Side::Afferent => paths::TARGET_NODE_ID,
            Side::Efferent => paths::SOURCE_NODE_ID,
        }
    }

    /// Group-`0` column name, e.g. `afferent_section_id`.
    pub fn column(self, field: &str) -> String {
        format!("{}_{}", self.prefix(), field)
    }
}

pub(crate) const SECTION_ID: &str = "section_id";
pub(crate) const SEGMENT_ID: &str = "segment_id";
pub(crate) const SEGMENT_OFFSET: &str = "segment_offset";
pub(crate) const SECTION_POS: &str = "section_pos";

/// Path of a group-`0` synapse column.
pub(crate) fn synapse_column(population: &str, side: Side, field: &str) -> String {
    paths::attribute(
        Category::Edges,
        population,
        paths::DEFAULT_GROUP,
        &side.column(field),
    )
}

/// Whether `side` has its section column.
pub(crate) fn has_side(container: &Container, population: &str, side: Side) -> bool {
    container.contains(&synapse_column(population, side, SECTION_ID))
}

/// Read a group-`0` integer synapse column.
pub(crate) fn int_column(
    container: &Container,
    population: &str,
    side: Side,
    field: &str,
) -> CurateResult<Vec<i64>> {
    let path = synapse_column(population, side, field);
    let ds = container
        .dataset(&path)
        .map_err(|_| CurateError::not_found("column", path.clone()))?;
    ds.as_ints()
        .map(<[i64]>::to_vec)
        .ok_or_else(|| CurateError::invariant(path, format!("expected int, found {}", ds.data.dtype())))
}

/// Read a group-`0` numeric synapse column as floats.
pub(crate) fn float_column(
    container: &Container,
    population: &str,
    side: Side,
    field: &str,
) -> CurateResult<Vec<f64>> {
    let path = synapse_column(population, side, field);
    let ds = container
        .dataset(&path)
        .map_err(|_| CurateError::not_found("column", path.clone()))?;
    match &ds.data {
        Data::Float(v) => Ok(v.clone()),
        Data::Int(v) => Ok(v.iter().map(|&i| i as f64).collect()),
        Data::Text(_) => Err(CurateError::invariant(path, "expected numbers, found text")),
    }
}

/// Cell id of every group-`0` row of an edge population, on one side.
pub(crate) fn group_zero_cells(
    container: &Container,
    population: &str,
    side: Side,
    group_rows: usize,
) -> CurateResult<Vec<i64>> {
    let column = paths::population_column(Category::Edges, population, side.node_column());
    let ids = container
        .dataset(&column)
        .map_err(|_| CurateError::not_found("column", column.clone()))?
        .as_ints()
        .map(<[i64]>::to_vec)
        .ok_or_else(|| CurateError::invariant(column.clone(), "node ids are not integers"))?;

    let mut cells = vec![None; group_rows];
    for ((group, index), id) in group_addresses(container, Category::Edges, population, ids.len())?
        .into_iter()
        .zip(ids)
    {
        if group == paths::DEFAULT_GROUP {
            if let Some(slot) = cells.get_mut(index) {
                *slot = Some(id);
            }
        }
    }
    cells
        .into_iter()
        .enumerate()
        .map(|(row, cell)| {
            cell.ok_or_else(|| {
                CurateError::invariant(
                    column.clone(),
                    format!("group row {} has no edge", row),
                )
            })
        })
        .collect()
}

/// Morphology name of a cell.
pub(crate) fn morphology_of(morphology_by_cell: &[String], cell: i64) -> CurateResult<&str> {
    usize::try_from(cell)
        .ok()
        .and_then(|c| morphology_by_cell.get(c))
        .map(String::as_str)
        .ok_or_else(|| CurateError::not_found("cell", cell.to_string()))
}
