//! reindex::position
//!
//! Normalized position of each synapse along its section.
//!
//! `section_pos` is the path length from the section's first point to the
//! synapse, divided by the section's total length, clamped to `[0, 1]`.
//! Zero-length sections give `0`.

use std::collections::HashMap;
use std::path::Path;

use crate::core::container::{Container, Dataset};
use crate::core::error::{CurateError, CurateResult};
use crate::core::paths;
use crate::core::types::Category;
use crate::morphology::tree::Morphology;
use crate::sonata::population::{edit_container, expect_category, resolve_population};

use super::{
    float_column, group_zero_cells, has_side, int_column, morphology_of, synapse_column, Side,
    SECTION_ID, SECTION_POS, SEGMENT_ID, SEGMENT_OFFSET,
};

/// Morphologies loaded on first use.
struct MorphologyCache<'a> {
    dir: &'a Path,
    loaded: HashMap<String, Morphology>,
}

impl<'a> MorphologyCache<'a> {
    fn new(dir: &'a Path) -> Self {
        Self {
            dir,
            loaded: HashMap::new(),
        }
    }

    fn get(&mut self, name: &str) -> CurateResult<&Morphology> {
        if !self.loaded.contains_key(name) {
            let morphology = Morphology::load(&paths::morphology_file(self.dir, name))?;
            self.loaded.insert(name.to_string(), morphology);
        }
        self.loaded
            .get(name)
            .ok_or_else(|| CurateError::not_found("morphology", name))
    }
}

/// Normalized position of `(section, segment, offset)` in `morphology`.
///
/// # Errors
///
/// Returns `InvariantViolation` if the reference does not resolve.
pub fn section_position(
    morphology: &Morphology,
    name: &str,
    section: i64,
    segment: i64,
    offset: f64,
) -> CurateResult<f64> {
    let unresolved = || {
        CurateError::invariant(
            name,
            format!("reference ({}, {}) does not resolve", section, segment),
        )
    };
    let section = usize::try_from(section)
        .ok()
        .and_then(|s| morphology.section(s))
        .ok_or_else(unresolved)?;
    let segment = usize::try_from(segment).map_err(|_| unresolved())?;
    let along = section
        .path_length_to(segment, offset)
        .ok_or_else(unresolved)?;
    let length = section.length();
    if length <= 0.0 {
        return Ok(0.0);
    }
    Ok((along / length).clamp(0.0, 1.0))
}

pub(crate) fn write_pos_in(
    container: &mut Container,
    morph_dir: &Path,
    morphology_by_cell: &[String],
    population: &str,
) -> CurateResult<usize> {
    let mut cache = MorphologyCache::new(morph_dir);
    let mut written = 0;
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
        let sections = int_column(container, population, side, SECTION_ID)?;
        let segments = int_column(container, population, side, SEGMENT_ID)?;
        let offsets = float_column(container, population, side, SEGMENT_OFFSET)?;
        if segments.len() != sections.len() || offsets.len() != sections.len() {
            return Err(CurateError::invariant(
                synapse_column(population, side, SEGMENT_OFFSET),
                "synapse columns differ in length",
            ));
        }
        let cells = group_zero_cells(container, population, side, sections.len())?;

        let positions = cells
            .iter()
            .enumerate()
            .map(|(row, &cell)| {
                let name = morphology_of(morphology_by_cell, cell)?;
                let morphology = cache.get(name)?;
                section_position(morphology, name, sections[row], segments[row], offsets[row])
            })
            .collect::<CurateResult<Vec<f64>>>()?;

        written += positions.len();
        container.put_dataset(
            &synapse_column(population, side, SECTION_POS),
            Dataset::floats(positions),
        )?;
        tracing::debug!(population, side = side.prefix(), rows = sections.len(), "wrote section positions");
    }
    Ok(written)
}

/// Write `afferent_section_pos` (and `efferent_section_pos` when efferent
/// columns exist) into group `0` of `population` in `edges`.
///
/// Returns the number of positions written.
pub fn write_sonata_pos(
    morph_dir: &Path,
    morphology_by_cell: &[String],
    population: &str,
    edges: &Path,
) -> CurateResult<usize> {
    edit_container(edges, |c| {
        expect_category(c, edges, Category::Edges)?;
        let population = resolve_population(c, edges, Some(population))?;
        write_pos_in(c, morph_dir, morphology_by_cell, &population)
    })
}
