//! morphology::check
//!
//! Batch invariant diagnostic over a morphology directory.
//!
//! Every morphology is checked independently. A morphology that cannot be
//! read is reported, not raised, so one bad file never hides the results
//! for the rest of the batch.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Serialize;

use super::tree::Morphology;
use crate::core::error::{CurateError, CurateResult};
use crate::core::paths;

/// Result of [`check_morphology_invariants`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvariantReport {
    /// Morphologies whose section ids are not in depth-first pre-order.
    pub incorrect_ordering: BTreeSet<String>,
    /// Morphologies with a non-soma section that has exactly one child.
    pub have_unifurcations: BTreeSet<String>,
    /// Morphologies that could not be read, with the reason.
    pub unreadable: BTreeMap<String, String>,
}

impl InvariantReport {
    /// Whether every checked morphology passed.
    pub fn is_clean(&self) -> bool {
        self.incorrect_ordering.is_empty()
            && self.have_unifurcations.is_empty()
            && self.unreadable.is_empty()
    }
}

/// Check ordering and unifurcations for each of `names` inside `dir`.
pub fn check_morphology_invariants<S: AsRef<str>>(dir: &Path, names: &[S]) -> InvariantReport {
    let mut report = InvariantReport::default();
    for name in names {
        let name = name.as_ref();
        let path = paths::morphology_file(dir, name);
        match Morphology::load(&path) {
            Ok(morphology) => {
                if !morphology.has_sonata_ordering() {
                    report.incorrect_ordering.insert(name.to_string());
                }
                if morphology.has_unifurcations() {
                    report.have_unifurcations.insert(name.to_string());
                }
                tracing::debug!(morphology = name, sections = morphology.len(), "checked");
            }
            Err(e) => {
                tracing::warn!(morphology = name, error = %e, "could not read morphology");
                report.unreadable.insert(name.to_string(), e.to_string());
            }
        }
    }
    report
}

/// Read morphology names from a morphology database.
///
/// The name is the first whitespace-separated column; blank lines and
/// lines starting with `#` are skipped. Duplicates keep their first
/// position.
pub fn load_morphdb(path: &Path) -> CurateResult<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|e| CurateError::io(path, e))?;
    let mut seen = BTreeSet::new();
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect())
}

/// Names of the morphologies stored in `dir`, sorted.
pub fn list_morphologies(dir: &Path) -> CurateResult<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| CurateError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CurateError::io(dir, e))?;
        if entry.path().is_file() {
            if let Some(name) = paths::morphology_name(&entry.path()) {
                names.push(name);
            }
        }
    }
    names.sort();
    Ok(names)
}
