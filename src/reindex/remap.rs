//! reindex::remap
//!
//! Rewrite synapse `(section_id, segment_id)` references after
//! morphology simplification.

use std::path::Path;

use crate::core::container::{Container, Dataset};
use crate::core::error::{CurateError, CurateResult};
use crate::core::paths;
use crate::core::types::Category;
use crate::morphology::simplify::UpdateArtifact;
use crate::sonata::library::read_strings;
use crate::sonata::population::{edit_container, expect_category, resolve_population};

use super::{
    group_zero_cells, has_side, int_column, morphology_of, synapse_column, Side, SECTION_ID,
    SEGMENT_ID,
};

/// Morphology name of every node, indexed by node id.
pub fn load_morphology_names(nodes: &Path, population: Option<&str>) -> CurateResult<Vec<String>> {
    let container = Container::load(nodes)?;
    expect_category(&container, nodes, Category::Nodes)?;
    let population = resolve_population(&container, nodes, population)?;
    read_strings(
        &container,
        Category::Nodes,
        &population,
        paths::DEFAULT_GROUP,
        "morphology",
    )
}

fn to_index(value: i64, column: &str, row: usize) -> CurateResult<usize> {
    usize::try_from(value).map_err(|_| {
        CurateError::invariant(column, format!("negative reference {} at row {}", value, row))
    })
}

pub(crate) fn apply_in(
    container: &mut Container,
    morphology_by_cell: &[String],
    updates: &UpdateArtifact,
    population: &str,
) -> CurateResult<usize> {
    let mut rewritten = 0;
    for side in Side::ALL {
        if !has_side(container, population, side) {
            if side == Side::Afferent {
                return Err(CurateError::not_found(
                    "column",
                    synapse_column(population, side, SECTION_ID),
                ));
            }
            continue;
        }
        let section_path = synapse_column(population, side, SECTION_ID);
        let segment_path = synapse_column(population, side, SEGMENT_ID);
        let mut sections = int_column(container, population, side, SECTION_ID)?;
        let mut segments = int_column(container, population, side, SEGMENT_ID)?;
        if sections.len() != segments.len() {
            return Err(CurateError::invariant(
                segment_path,
                "section and segment columns differ in length",
            ));
        }
        let cells = group_zero_cells(container, population, side, sections.len())?;

        let mut changed = 0;
        for (row, &cell) in cells.iter().enumerate() {
            let name = morphology_of(morphology_by_cell, cell)?;
            let Some(update) = updates.get(name) else {
                continue;
            };
            let section = to_index(sections[row], &section_path, row)?;
            let segment = to_index(segments[row], &segment_path, row)?;
            let (new_section, new_segment) = update.remap(section, segment);
            if (new_section, new_segment) != (section, segment) {
                sections[row] = new_section as i64;
                segments[row] = new_segment as i64;
                changed += 1;
            }
        }

        for (path, values) in [(&section_path, sections), (&segment_path, segments)] {
            let attrs = container.dataset(path)?.attrs.clone();
            let mut ds = Dataset::ints(values);
            ds.attrs = attrs;
            container.put_dataset(path, ds)?;
        }
        tracing::debug!(population, side = side.prefix(), changed, "remapped synapse references");
        rewritten += changed;
    }
    Ok(rewritten)
}

/// Rewrite every synapse reference of `population` in `edges` whose cell's
/// morphology has an update record.
///
/// `morphology_by_cell[id]` names the morphology of node `id`. Returns the
/// number of rewritten references.
///
/// # Errors
///
/// - `NotFound` if a cell id falls outside `morphology_by_cell`, or the
///   afferent columns are missing
pub fn apply_edge_updates(
    morphology_by_cell: &[String],
    edges: &Path,
    updates: &UpdateArtifact,
    population: &str,
) -> CurateResult<usize> {
    edit_container(edges, |c| {
        expect_category(c, edges, Category::Edges)?;
        let population = resolve_population(c, edges, Some(population))?;
        apply_in(c, morphology_by_cell, updates, &population)
    })
}
