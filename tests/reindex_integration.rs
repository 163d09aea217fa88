//! Integration tests for morphology checks, simplification, and synapse
//! reindexing.
//!
//! The central property: after a morphology is simplified and the edge
//! references are remapped with its update record, every synapse still
//! points at the same physical segment.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use sonatakit::core::container::{Container, Dataset};
use sonatakit::core::error::CurateError;
use sonatakit::core::paths;
use sonatakit::core::types::Category;
use sonatakit::morphology::check::{check_morphology_invariants, list_morphologies};
use sonatakit::morphology::simplify::{
    generate_updates, load_updates, save_updates, simplify, write_new_morphs,
};
use sonatakit::morphology::tree::{Morphology, Point, SectionData, SOMA_TYPE};
use sonatakit::reindex::{apply_edge_updates, load_morphology_names, write_sonata_pos};
use sonatakit::sonata::library::write_categorical;

const WRONG: &str = "wrong-order-with-unifurcations";
const CHAIN: &str = "chain";
const GOOD: &str = "good";

// =============================================================================
// Test Fixtures
// =============================================================================

fn p(x: f64, y: f64, z: f64) -> Point {
    Point::new(x, y, z, 1.0)
}

fn section(section_type: i64, parent: Option<usize>, points: Vec<Point>) -> SectionData {
    SectionData {
        section_type,
        parent,
        points,
    }
}

/// Section 1 hangs off section 3, so ids are not in pre-order, and
/// section 2 has exactly one child.
///
/// ```text
/// 0(soma) - 2 - 3 < 1
///                 \ 4
/// ```
fn wrong_order_with_unifurcations() -> Morphology {
    Morphology::build(
        vec![
            section(SOMA_TYPE, None, vec![p(-1.0, 0.0, 0.0), p(0.0, 0.0, 0.0)]),
            section(3, Some(3), vec![p(1.0, 4.0, 0.0), p(2.0, 5.0, 0.0)]),
            section(
                3,
                Some(0),
                vec![p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(0.0, 2.0, 0.0)],
            ),
            section(
                3,
                Some(2),
                vec![p(0.0, 2.0, 0.0), p(0.0, 3.0, 0.0), p(1.0, 4.0, 0.0)],
            ),
            section(3, Some(3), vec![p(1.0, 4.0, 0.0), p(0.0, 5.0, 1.0)]),
        ],
        WRONG,
    )
    .unwrap()
}

/// Three chained sections, the middle junction without a shared point.
fn chain() -> Morphology {
    Morphology::build(
        vec![
            section(SOMA_TYPE, None, vec![p(0.0, 0.0, 0.0), p(0.0, 0.0, 1.0)]),
            section(2, Some(0), vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0)]),
            section(2, Some(1), vec![p(2.0, 0.0, 0.0), p(3.0, 0.0, 0.0)]),
            section(2, Some(2), vec![p(3.0, 0.0, 0.0), p(3.0, 1.0, 0.0)]),
            section(2, Some(2), vec![p(3.0, 0.0, 0.0), p(3.0, -1.0, 0.0)]),
        ],
        CHAIN,
    )
    .unwrap()
}

fn good() -> Morphology {
    Morphology::build(
        vec![
            section(SOMA_TYPE, None, vec![p(0.0, 0.0, 0.0), p(0.0, 1.0, 0.0)]),
            section(3, Some(0), vec![p(0.0, 1.0, 0.0), p(1.0, 2.0, 0.0)]),
            section(3, Some(0), vec![p(0.0, 1.0, 0.0), p(-1.0, 2.0, 0.0)]),
        ],
        GOOD,
    )
    .unwrap()
}

/// Every (section, segment) reference of the non-soma sections.
fn references(morphology: &Morphology) -> Vec<(usize, usize)> {
    morphology
        .sections()
        .iter()
        .filter(|s| !s.is_soma())
        .flat_map(|s| (0..s.segment_count()).map(move |segment| (s.id, segment)))
        .collect()
}

fn midpoint(morphology: &Morphology, section: usize, segment: usize) -> [f64; 3] {
    morphology
        .section(section)
        .and_then(|s| s.segment_midpoint(segment))
        .unwrap_or_else(|| panic!("({}, {}) does not resolve", section, segment))
}

/// Scratch circuit with a morphology directory, a node file, and an edge file.
struct TestCircuit {
    dir: TempDir,
}

impl TestCircuit {
    fn new() -> Self {
        let circuit = Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        };
        fs::create_dir_all(circuit.morphs()).unwrap();
        for (name, morphology) in [
            (WRONG, wrong_order_with_unifurcations()),
            (CHAIN, chain()),
            (GOOD, good()),
        ] {
            morphology
                .save(&paths::morphology_file(&circuit.morphs(), name))
                .unwrap();
        }
        circuit
    }

    fn morphs(&self) -> PathBuf {
        self.dir.path().join("morphologies")
    }

    fn simplified(&self) -> PathBuf {
        self.dir.path().join("simplified")
    }

    /// Cells 0, 1, 2 use WRONG, GOOD, CHAIN.
    fn nodes(&self) -> PathBuf {
        let mut c = Container::new();
        c.put_dataset("nodes/cells/node_type_id", Dataset::ints(vec![-1; 3]))
            .unwrap();
        write_categorical(
            &mut c,
            Category::Nodes,
            "cells",
            "0",
            "morphology",
            &[WRONG, GOOD, CHAIN],
        )
        .unwrap();
        let path = self.dir.path().join("nodes.json");
        c.save(&path).unwrap();
        path
    }

    /// One synapse per reference of every cell's morphology, on both sides.
    fn edges(&self, population: &str) -> (PathBuf, Vec<(i64, usize, usize)>) {
        let morphologies = [wrong_order_with_unifurcations(), good(), chain()];
        let mut rows = Vec::new();
        for (cell, morphology) in morphologies.iter().enumerate() {
            for (section, segment) in references(morphology) {
                rows.push((cell as i64, section, segment));
            }
        }
        let cells: Vec<i64> = rows.iter().map(|r| r.0).collect();
        let sections: Vec<i64> = rows.iter().map(|r| r.1 as i64).collect();
        let segments: Vec<i64> = rows.iter().map(|r| r.2 as i64).collect();

        let mut c = Container::new();
        let base = format!("edges/{}", population);
        c.put_dataset(&format!("{base}/source_node_id"), Dataset::ints(cells.clone()))
            .unwrap();
        c.put_dataset(&format!("{base}/target_node_id"), Dataset::ints(cells))
            .unwrap();
        for side in ["afferent", "efferent"] {
            c.put_dataset(
                &format!("{base}/0/{side}_section_id"),
                Dataset::ints(sections.clone()),
            )
            .unwrap();
            c.put_dataset(
                &format!("{base}/0/{side}_segment_id"),
                Dataset::ints(segments.clone()),
            )
            .unwrap();
            c.put_dataset(
                &format!("{base}/0/{side}_segment_offset"),
                Dataset::floats(vec![0.25; rows.len()]),
            )
            .unwrap();
        }
        let path = self.dir.path().join(format!("{}.json", population));
        c.save(&path).unwrap();
        (path, rows)
    }
}

fn int_column(path: &Path, column: &str) -> Vec<i64> {
    Container::load(path)
        .unwrap()
        .dataset(column)
        .unwrap()
        .as_ints()
        .unwrap()
        .to_vec()
}

// =============================================================================
// Check
// =============================================================================

#[test]
fn batch_check_reports_each_morphology() {
    let circuit = TestCircuit::new();
    let names = list_morphologies(&circuit.morphs()).unwrap();
    assert_eq!(names, vec![CHAIN, GOOD, WRONG]);

    let report = check_morphology_invariants(&circuit.morphs(), &names);
    assert_eq!(
        report.incorrect_ordering.iter().collect::<Vec<_>>(),
        vec![WRONG]
    );
    assert_eq!(
        report.have_unifurcations.iter().collect::<Vec<_>>(),
        vec![CHAIN, WRONG]
    );
    assert!(report.unreadable.is_empty());
    assert!(!report.is_clean());
}

#[test]
fn unreadable_morphology_does_not_stop_the_batch() {
    let circuit = TestCircuit::new();
    fs::write(paths::morphology_file(&circuit.morphs(), "broken"), b"not json").unwrap();

    let report = check_morphology_invariants(&circuit.morphs(), &["broken", GOOD, "missing"]);
    assert_eq!(
        report.unreadable.keys().collect::<Vec<_>>(),
        vec!["broken", "missing"]
    );
    assert!(report.incorrect_ordering.is_empty());
}

// =============================================================================
// Simplify
// =============================================================================

#[test]
fn simplified_morphologies_pass_both_checks() {
    let circuit = TestCircuit::new();
    let updates = generate_updates(&circuit.morphs()).unwrap();
    assert_eq!(updates.keys().collect::<Vec<_>>(), vec![CHAIN, WRONG]);

    assert_eq!(
        write_new_morphs(&updates, &circuit.morphs(), &circuit.simplified()).unwrap(),
        3
    );
    let names = list_morphologies(&circuit.simplified()).unwrap();
    assert_eq!(names.len(), 3);
    assert!(check_morphology_invariants(&circuit.simplified(), &names).is_clean());

    // Untouched morphologies are copied byte for byte.
    assert_eq!(
        fs::read(paths::morphology_file(&circuit.morphs(), GOOD)).unwrap(),
        fs::read(paths::morphology_file(&circuit.simplified(), GOOD)).unwrap()
    );
    // Inputs are never modified.
    assert!(!check_morphology_invariants(&circuit.morphs(), &names).is_clean());
}

#[test]
fn wrong_order_record_renumbers_to_preorder() {
    let (simplified, update) = simplify(&wrong_order_with_unifurcations()).unwrap();
    assert_eq!(simplified.len(), 4);
    // Old 2 and 3 merge into new 1; old 1 and 4 become its children.
    assert_eq!(update.remap(2, 1), (1, 1));
    assert_eq!(update.remap(3, 0), (1, 2));
    assert_eq!(update.remap(1, 0), (2, 0));
    assert_eq!(update.remap(4, 0), (3, 0));
    assert_eq!(simplified.section(1).unwrap().children, vec![2, 3]);
}

#[test]
fn remapped_references_keep_their_midpoints() {
    for original in [wrong_order_with_unifurcations(), chain()] {
        let (simplified, update) = simplify(&original).unwrap();
        for (section, segment) in references(&original) {
            let (new_section, new_segment) = update.remap(section, segment);
            assert_eq!(
                midpoint(&original, section, segment),
                midpoint(&simplified, new_section, new_segment),
                "reference ({}, {})",
                section,
                segment
            );
        }
    }
}

#[test]
fn existing_output_directory_is_refused() {
    let circuit = TestCircuit::new();
    fs::create_dir_all(circuit.simplified()).unwrap();
    let updates = generate_updates(&circuit.morphs()).unwrap();
    assert!(matches!(
        write_new_morphs(&updates, &circuit.morphs(), &circuit.simplified()),
        Err(CurateError::AlreadyExists(_))
    ));
}

#[test]
fn tampered_record_is_rejected_without_output() {
    let circuit = TestCircuit::new();
    let mut updates = generate_updates(&circuit.morphs()).unwrap();
    if let Some(update) = updates.get_mut(CHAIN) {
        update.new_segment_offset.insert(1, 99);
    }
    assert!(matches!(
        write_new_morphs(&updates, &circuit.morphs(), &circuit.simplified()),
        Err(CurateError::InvariantViolation { .. })
    ));
    assert!(!circuit.simplified().exists());
}

// =============================================================================
// Edge updates
// =============================================================================

#[test]
fn edge_references_follow_the_update_record() {
    let circuit = TestCircuit::new();
    let updates = generate_updates(&circuit.morphs()).unwrap();
    write_new_morphs(&updates, &circuit.morphs(), &circuit.simplified()).unwrap();
    let record = circuit.simplified().join(paths::UPDATES_FILE);
    save_updates(&record, &updates).unwrap();

    let nodes = circuit.nodes();
    let (edges, rows) = circuit.edges("cells__cells__chemical");
    let morphology_by_cell = load_morphology_names(&nodes, None).unwrap();
    assert_eq!(morphology_by_cell, vec![WRONG, GOOD, CHAIN]);

    let updates = load_updates(&record).unwrap();
    apply_edge_updates(&morphology_by_cell, &edges, &updates, "cells__cells__chemical").unwrap();

    let originals = [wrong_order_with_unifurcations(), good(), chain()];
    let simplified: Vec<Morphology> = morphology_by_cell
        .iter()
        .map(|name| Morphology::load(&paths::morphology_file(&circuit.simplified(), name)).unwrap())
        .collect();

    for side in ["afferent", "efferent"] {
        let sections = int_column(&edges, &format!("edges/cells__cells__chemical/0/{side}_section_id"));
        let segments = int_column(&edges, &format!("edges/cells__cells__chemical/0/{side}_segment_id"));
        for (row, &(cell, section, segment)) in rows.iter().enumerate() {
            let cell = cell as usize;
            assert_eq!(
                midpoint(&originals[cell], section, segment),
                midpoint(
                    &simplified[cell],
                    sections[row] as usize,
                    segments[row] as usize
                ),
                "{} row {}",
                side,
                row
            );
        }
    }
}

#[test]
fn section_positions_written_after_update() {
    let circuit = TestCircuit::new();
    let updates = generate_updates(&circuit.morphs()).unwrap();
    write_new_morphs(&updates, &circuit.morphs(), &circuit.simplified()).unwrap();
    let nodes = circuit.nodes();
    let (edges, rows) = circuit.edges("cells__cells__chemical");
    let morphology_by_cell = load_morphology_names(&nodes, None).unwrap();

    apply_edge_updates(&morphology_by_cell, &edges, &updates, "cells__cells__chemical").unwrap();
    let written = write_sonata_pos(
        &circuit.simplified(),
        &morphology_by_cell,
        "cells__cells__chemical",
        &edges,
    )
    .unwrap();
    assert_eq!(written, rows.len() * 2);

    let c = Container::load(&edges).unwrap();
    let positions = c
        .dataset("edges/cells__cells__chemical/0/afferent_section_pos")
        .unwrap()
        .as_floats()
        .unwrap();
    assert_eq!(positions.len(), rows.len());
    assert!(positions.iter().all(|&pos| (0.0..=1.0).contains(&pos)));
}

#[test]
fn unknown_edge_population_is_not_found() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes();
    let (edges, _) = circuit.edges("cells__cells__chemical");
    let morphology_by_cell = load_morphology_names(&nodes, None).unwrap();
    let updates = generate_updates(&circuit.morphs()).unwrap();
    assert!(matches!(
        apply_edge_updates(&morphology_by_cell, &edges, &updates, "other"),
        Err(CurateError::NotFound { .. })
    ));
}
