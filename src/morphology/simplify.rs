//! morphology::simplify
//!
//! Remove unifurcations and record how section references move.
//!
//! # Algorithm
//!
//! A unifurcation is a non-soma section with exactly one child. Each maximal
//! chain of them collapses into the section where the chain ends (the first
//! section with zero or several children):
//!
//! ```text
//! before:  0(soma) - 1 - 2 - 3 < 4      after:  0(soma) - 1 < 2
//!                              \ 5                          \ 3
//! ```
//!
//! The surviving section takes the chain's points top-down. A section's
//! first point is dropped when it repeats the last merged point. The
//! surviving forest is then renumbered to depth-first pre-order.
//!
//! # Reindex Update
//!
//! For every old section id:
//! - `new_parents[old]`: the new id of the section its segments now live in,
//!   recorded when it differs from `old`
//! - `new_segment_offset[old]`: how many segments precede its first segment
//!   in that section, recorded when nonzero
//!
//! so that `(section, segment)` maps to
//! `(new_parents.get(section) or section, segment + new_segment_offset.get(section) or 0)`.
//!
//! The computation depends only on the input morphology, so the same input
//! always produces the same output and record.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::check::list_morphologies;
use super::tree::{Morphology, Point, SectionData};
use crate::core::container::io::write_atomic;
use crate::core::error::{CurateError, CurateResult};
use crate::core::paths;

/// How section references of one morphology move under simplification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexUpdate {
    pub new_parents: BTreeMap<usize, usize>,
    pub new_segment_offset: BTreeMap<usize, usize>,
}

impl ReindexUpdate {
    /// Remap a `(section, segment)` reference.
    ///
    /// # Example
    ///
    /// ```
    /// use sonatakit::morphology::simplify::ReindexUpdate;
    ///
    /// let mut update = ReindexUpdate::default();
    /// update.new_parents.insert(2, 1);
    /// update.new_segment_offset.insert(2, 3);
    /// assert_eq!(update.remap(2, 0), (1, 3));
    /// assert_eq!(update.remap(5, 4), (5, 4));
    /// ```
    pub fn remap(&self, section: usize, segment: usize) -> (usize, usize) {
        (
            self.new_parents.get(&section).copied().unwrap_or(section),
            segment + self.new_segment_offset.get(&section).copied().unwrap_or(0),
        )
    }
}

/// Update records keyed by morphology name.
pub type UpdateArtifact = BTreeMap<String, ReindexUpdate>;

/// Simplify a morphology; `None` when it has no unifurcation.
pub fn simplify(morphology: &Morphology) -> Option<(Morphology, ReindexUpdate)> {
    if !morphology.has_unifurcations() {
        return None;
    }
    let sections = morphology.sections();
    let count = sections.len();

    let mut survivor: Vec<usize> = (0..count).collect();
    let mut shift = vec![0usize; count];
    let mut merged: BTreeMap<usize, (Option<usize>, Vec<Point>)> = BTreeMap::new();

    for top in 0..count {
        let is_chain_top = morphology.is_unifurcation(top)
            && !sections[top]
                .parent
                .is_some_and(|p| morphology.is_unifurcation(p));
        if !is_chain_top {
            continue;
        }
        let mut chain = vec![top];
        let mut current = top;
        while morphology.is_unifurcation(current) {
            current = sections[current].children[0];
            chain.push(current);
        }

        let mut points: Vec<Point> = Vec::new();
        for &id in &chain {
            let own = &sections[id].points;
            let duplicated = matches!((points.last(), own.first()), (Some(a), Some(b)) if a == b);
            let skip = usize::from(duplicated);
            shift[id] = points.len() - skip;
            points.extend(own.iter().skip(skip).copied());
            survivor[id] = current;
        }
        merged.insert(current, (sections[top].parent, points));
    }

    // Surviving forest in depth-first pre-order over old ids.
    let kept_children = |id: usize| -> Vec<usize> {
        sections[id].children.iter().map(|&c| survivor[c]).collect()
    };
    let mut order = Vec::new();
    // A root that heads a chain is replaced by the section the chain ends in.
    let mut stack: Vec<usize> = Vec::new();
    for root in morphology.roots().map(|r| survivor[r]) {
        if !stack.contains(&root) {
            stack.push(root);
        }
    }
    stack.reverse();
    while let Some(id) = stack.pop() {
        order.push(id);
        stack.extend(kept_children(id).into_iter().rev());
    }

    let mut new_id = vec![usize::MAX; count];
    for (position, &old) in order.iter().enumerate() {
        new_id[old] = position;
    }

    let parts = order
        .iter()
        .map(|&old| {
            let (parent, points) = match merged.get(&old) {
                Some((parent, points)) => (*parent, points.clone()),
                None => (sections[old].parent, sections[old].points.clone()),
            };
            SectionData {
                section_type: sections[old].section_type,
                parent: parent.map(|p| new_id[survivor[p]]),
                points,
            }
        })
        .collect();
    // Relinks a subset of an already valid forest.
    let simplified = Morphology::build(parts, "simplified").ok()?;

    let mut update = ReindexUpdate::default();
    for old in 0..count {
        let target = new_id[survivor[old]];
        if target != old {
            update.new_parents.insert(old, target);
        }
        if shift[old] != 0 {
            update.new_segment_offset.insert(old, shift[old]);
        }
    }
    Some((simplified, update))
}

/// Compute update records for every morphology in `morph_dir` that has a
/// unifurcation.
pub fn generate_updates(morph_dir: &Path) -> CurateResult<UpdateArtifact> {
    let mut updates = UpdateArtifact::new();
    for name in list_morphologies(morph_dir)? {
        let morphology = Morphology::load(&paths::morphology_file(morph_dir, &name))?;
        if let Some((_, update)) = simplify(&morphology) {
            tracing::debug!(
                morphology = %name,
                moved = update.new_parents.len(),
                "computed update"
            );
            updates.insert(name, update);
        }
    }
    Ok(updates)
}

/// Write every morphology of `morph_dir` into the new directory `output`:
/// simplified where `updates` has a record, copied otherwise.
///
/// The output is staged in a hidden sibling directory and renamed into
/// place, so a failure never leaves a partial `output`.
///
/// Returns the number of morphologies written.
///
/// # Errors
///
/// - `AlreadyExists` if `output` exists
/// - `InvariantViolation` if a record does not match its morphology
pub fn write_new_morphs(
    updates: &UpdateArtifact,
    morph_dir: &Path,
    output: &Path,
) -> CurateResult<usize> {
    if output.exists() {
        return Err(CurateError::AlreadyExists(format!(
            "directory '{}'",
            output.display()
        )));
    }
    let staging = staging_dir(output);
    fs::create_dir_all(&staging).map_err(|e| CurateError::io(&staging, e))?;

    let result = write_into(updates, morph_dir, &staging).and_then(|written| {
        fs::rename(&staging, output).map_err(|e| CurateError::io(output, e))?;
        Ok(written)
    });
    if result.is_err() {
        let _ = fs::remove_dir_all(&staging);
    }
    result
}

fn staging_dir(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
}

fn write_into(updates: &UpdateArtifact, morph_dir: &Path, staging: &Path) -> CurateResult<usize> {
    let names = list_morphologies(morph_dir)?;
    for name in updates.keys() {
        if !names.contains(name) {
            return Err(CurateError::not_found("morphology", name.clone()));
        }
    }
    for name in &names {
        let source = paths::morphology_file(morph_dir, name);
        let destination = paths::morphology_file(staging, name);
        match updates.get(name) {
            Some(recorded) => {
                let morphology = Morphology::load(&source)?;
                let (simplified, update) = simplify(&morphology).ok_or_else(|| {
                    CurateError::invariant(name.clone(), "record given but nothing to simplify")
                })?;
                if &update != recorded {
                    return Err(CurateError::invariant(
                        name.clone(),
                        "record does not match the morphology",
                    ));
                }
                simplified.save(&destination)?;
                tracing::debug!(morphology = %name, sections = simplified.len(), "simplified");
            }
            None => {
                fs::copy(&source, &destination).map_err(|e| CurateError::io(&source, e))?;
            }
        }
    }
    Ok(names.len())
}

/// Persist an update artifact as JSON.
pub fn save_updates(path: &Path, updates: &UpdateArtifact) -> CurateResult<()> {
    let json = serde_json::to_vec_pretty(updates).map_err(|e| CurateError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    write_atomic(path, &json)?;
    Ok(())
}

/// Load an update artifact written by [`save_updates`].
pub fn load_updates(path: &Path) -> CurateResult<UpdateArtifact> {
    let bytes = fs::read(path).map_err(|e| CurateError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| CurateError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morphology::tree::fixtures::{chain, line, section};
    use crate::morphology::tree::SOMA_TYPE;
    use tempfile::TempDir;

    #[test]
    fn nothing_to_simplify() {
        let m = Morphology::build(
            vec![
                section(SOMA_TYPE, None, line(0.0, 1.0)),
                section(3, Some(0), line(1.0, 2.0)),
            ],
            "plain",
        )
        .unwrap();
        assert!(simplify(&m).is_none());
    }

    #[test]
    fn chain_collapses_into_branching_section() {
        let (m, update) = simplify(&chain()).unwrap();
        assert_eq!(m.len(), 4);
        assert!(!m.has_unifurcations());
        assert!(m.has_sonata_ordering());

        // 1, 2, 3 share points at their junctions, so the merged
        // section runs 0 -> 1 -> 2 -> 3 with three segments.
        let merged = m.section(1).unwrap();
        assert_eq!(merged.points.len(), 4);
        assert_eq!(merged.children, vec![2, 3]);

        let expected_parents: BTreeMap<usize, usize> =
            [(2, 1), (3, 1), (4, 2), (5, 3)].into_iter().collect();
        let expected_offsets: BTreeMap<usize, usize> = [(2, 1), (3, 2)].into_iter().collect();
        assert_eq!(update.new_parents, expected_parents);
        assert_eq!(update.new_segment_offset, expected_offsets);
    }

    #[test]
    fn junction_without_duplicate_keeps_all_points() {
        let m = Morphology::build(
            vec![
                section(SOMA_TYPE, None, line(-1.0, 0.0)),
                section(3, Some(0), line(0.0, 1.0)),
                section(3, Some(1), line(2.0, 3.0)),
                section(3, Some(2), line(3.0, 4.0)),
                section(3, Some(2), line(3.0, 5.0)),
            ],
            "gap",
        )
        .unwrap();
        let (simplified, update) = simplify(&m).unwrap();
        assert_eq!(simplified.section(1).unwrap().points.len(), 4);
        assert_eq!(update.remap(2, 0), (1, 2));
    }

    #[test]
    fn parentless_root_chain_is_merged_away() {
        // 0 (root, no soma) -> 1 -> {2, 3}
        let m = Morphology::build(
            vec![
                section(3, None, line(0.0, 1.0)),
                section(3, Some(0), line(1.0, 2.0)),
                section(3, Some(1), line(2.0, 3.0)),
                section(3, Some(1), line(2.0, 4.0)),
            ],
            "rootless",
        )
        .unwrap();
        let (simplified, update) = simplify(&m).unwrap();

        assert_eq!(simplified.len(), 3);
        assert!(!simplified.has_unifurcations());
        assert!(simplified.has_sonata_ordering());
        assert_eq!(simplified.roots().collect::<Vec<_>>(), vec![0]);
        let root = simplified.section(0).unwrap();
        assert_eq!(root.points.len(), 3);
        assert_eq!(root.children, vec![1, 2]);

        let expected_parents: BTreeMap<usize, usize> =
            [(1, 0), (2, 1), (3, 2)].into_iter().collect();
        let expected_offsets: BTreeMap<usize, usize> = [(1, 1)].into_iter().collect();
        assert_eq!(update.new_parents, expected_parents);
        assert_eq!(update.new_segment_offset, expected_offsets);

        for old in m.sections() {
            let (section, segment) = update.remap(old.id, 0);
            assert_eq!(
                simplified.section(section).and_then(|s| s.segment_midpoint(segment)),
                old.segment_midpoint(0)
            );
        }
    }

    #[test]
    fn several_roots_keep_their_order() {
        // Soma 0 with a plain neurite, and a separate chain root 2 -> 3 -> {4, 5}.
        let m = Morphology::build(
            vec![
                section(SOMA_TYPE, None, line(-1.0, 0.0)),
                section(3, Some(0), line(0.0, 1.0)),
                section(2, None, line(10.0, 11.0)),
                section(2, Some(2), line(11.0, 12.0)),
                section(2, Some(3), line(12.0, 13.0)),
                section(2, Some(3), line(12.0, 14.0)),
            ],
            "two-roots",
        )
        .unwrap();
        let (simplified, update) = simplify(&m).unwrap();

        assert_eq!(simplified.len(), 5);
        assert_eq!(simplified.roots().collect::<Vec<_>>(), vec![0, 2]);
        assert!(!simplified.has_unifurcations());
        assert!(simplified.has_sonata_ordering());
        assert_eq!(update.remap(2, 0), (2, 0));
        assert_eq!(update.remap(3, 0), (2, 1));
        assert_eq!(update.remap(5, 0), (4, 0));
    }

    #[test]
    fn simplification_is_deterministic() {
        assert_eq!(simplify(&chain()), simplify(&chain()));
    }

    #[test]
    fn updates_roundtrip_with_string_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(paths::UPDATES_FILE);
        let mut updates = UpdateArtifact::new();
        updates.insert("chain".into(), simplify(&chain()).unwrap().1);

        save_updates(&path, &updates).unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["chain"]["new_parents"]["2"], 1);
        assert_eq!(load_updates(&path).unwrap(), updates);
    }

    #[test]
    fn write_refuses_existing_output() {
        let temp = TempDir::new().unwrap();
        let result = write_new_morphs(&UpdateArtifact::new(), temp.path(), temp.path());
        assert!(matches!(result, Err(CurateError::AlreadyExists(_))));
    }
}
