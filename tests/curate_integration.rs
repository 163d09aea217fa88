//! Integration tests for population curation.
//!
//! These tests build small node/edge containers on disk and drive the public
//! curation operations against them, checking both the returned values and
//! the containers left behind.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use sonatakit::core::container::{AttrValue, Container, Dataset};
use sonatakit::core::error::CurateError;
use sonatakit::core::paths;
use sonatakit::core::types::Category;
use sonatakit::sonata::curate::{
    correct_source_nodes_offset, create_projection_source_nodes, merge_h5_files,
    rewire_edge_population,
};
use sonatakit::sonata::library::{is_categorical, read_strings, write_categorical};
use sonatakit::sonata::population::{
    add_type_id, get_population_name, get_population_names, rename_population,
    set_group_attribute, AttributeValue,
};
use sonatakit::sonata::split::split_population;

// =============================================================================
// Test Fixtures
// =============================================================================

/// Scratch directory holding circuit containers.
struct TestCircuit {
    dir: TempDir,
}

impl TestCircuit {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn file(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Node container with one population per `(name, size)`.
    fn nodes(&self, name: &str, populations: &[(&str, usize)]) -> PathBuf {
        let mut c = Container::new();
        c.create_group("nodes").unwrap();
        for &(population, size) in populations {
            c.put_dataset(
                &format!("nodes/{}/node_type_id", population),
                Dataset::ints(vec![-1; size]),
            )
            .unwrap();
            c.put_dataset(
                &format!("nodes/{}/0/x", population),
                Dataset::floats((0..size).map(|i| i as f64).collect()),
            )
            .unwrap();
        }
        self.save(name, &c)
    }

    /// Edge container with one population.
    fn edges(&self, name: &str, population: &str, sources: Vec<i64>, targets: Vec<i64>) -> PathBuf {
        let rows = sources.len();
        let mut c = Container::new();
        let p = format!("edges/{}", population);
        c.put_dataset(&format!("{p}/source_node_id"), Dataset::ints(sources))
            .unwrap();
        c.put_dataset(&format!("{p}/target_node_id"), Dataset::ints(targets))
            .unwrap();
        c.put_dataset(&format!("{p}/edge_type_id"), Dataset::ints(vec![-1; rows]))
            .unwrap();
        c.put_dataset(
            &format!("{p}/0/syn_weight"),
            Dataset::floats((0..rows).map(|i| i as f64 * 0.5).collect()),
        )
        .unwrap();
        self.save(name, &c)
    }

    fn save(&self, name: &str, container: &Container) -> PathBuf {
        let path = self.file(name);
        container.save(&path).expect("failed to save container");
        path
    }

    fn load(&self, path: &Path) -> Container {
        Container::load(path).expect("failed to load container")
    }
}

fn fingerprint(path: &Path) -> String {
    Container::load(path)
        .unwrap()
        .fingerprint()
        .unwrap()
        .to_string()
}

// =============================================================================
// Population names and rename
// =============================================================================

#[test]
fn population_names_are_sorted() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("thalamus", 2), ("cortex", 3)]);
    assert_eq!(
        get_population_names(&nodes).unwrap(),
        vec!["cortex".to_string(), "thalamus".to_string()]
    );
}

#[test]
fn omitted_name_with_several_populations_is_ambiguous() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("a", 1), ("b", 1)]);
    let before = fingerprint(&nodes);

    assert!(matches!(
        get_population_name(&nodes, None),
        Err(CurateError::AmbiguousPopulation { .. })
    ));
    assert!(matches!(
        rename_population(&nodes, "c", None),
        Err(CurateError::AmbiguousPopulation { .. })
    ));
    assert_eq!(fingerprint(&nodes), before);
}

#[test]
fn rename_and_back_restores_content() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("default", 4)]);
    let before = fingerprint(&nodes);

    assert_eq!(rename_population(&nodes, "CA1", None).unwrap(), "CA1");
    assert_eq!(get_population_names(&nodes).unwrap(), vec!["CA1"]);
    rename_population(&nodes, "default", Some("CA1")).unwrap();

    assert_eq!(fingerprint(&nodes), before);
}

#[test]
fn rename_onto_existing_population_fails() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("a", 1), ("b", 1)]);
    assert!(matches!(
        rename_population(&nodes, "b", Some("a")),
        Err(CurateError::DuplicatePopulation { .. })
    ));
}

#[test]
fn lock_file_is_released_after_edit() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("default", 1)]);
    rename_population(&nodes, "renamed", None).unwrap();
    // A second edit would block or fail if the first kept its lock.
    rename_population(&nodes, "default", None).unwrap();
}

// =============================================================================
// Attributes
// =============================================================================

#[test]
fn text_attribute_is_library_encoded_and_broadcast() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("default", 3)]);
    set_group_attribute(
        &nodes,
        Category::Nodes,
        "default",
        "0",
        "model_type",
        AttributeValue::parse("biophysical"),
        false,
    )
    .unwrap();

    let c = circuit.load(&nodes);
    assert!(is_categorical(&c, Category::Nodes, "default", "0", "model_type"));
    assert_eq!(
        read_strings(&c, Category::Nodes, "default", "0", "model_type").unwrap(),
        vec!["biophysical"; 3]
    );
}

#[test]
fn existing_attribute_needs_overwrite() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("default", 3)]);
    let set = |overwrite| {
        set_group_attribute(
            &nodes,
            Category::Nodes,
            "default",
            "0",
            "x",
            AttributeValue::Floats(vec![7.0, 8.0, 9.0]),
            overwrite,
        )
    };
    assert!(matches!(set(false), Err(CurateError::AlreadyExists(_))));
    set(true).unwrap();
    assert_eq!(
        circuit
            .load(&nodes)
            .dataset("nodes/default/0/x")
            .unwrap()
            .as_floats()
            .unwrap(),
        &[7.0, 8.0, 9.0]
    );
}

#[test]
fn wrong_length_overwrite_is_shape_mismatch() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("default", 3)]);
    let result = set_group_attribute(
        &nodes,
        Category::Nodes,
        "default",
        "0",
        "x",
        AttributeValue::Floats(vec![1.0, 2.0]),
        true,
    );
    assert!(matches!(result, Err(CurateError::ShapeMismatch { .. })));
}

#[test]
fn type_id_backfilled_once() {
    let circuit = TestCircuit::new();
    let mut c = Container::new();
    c.put_dataset("edges/e/source_node_id", Dataset::ints(vec![0, 1, 2]))
        .unwrap();
    c.put_dataset("edges/e/target_node_id", Dataset::ints(vec![2, 1, 0]))
        .unwrap();
    let edges = circuit.save("edges.json", &c);

    assert!(add_type_id(&edges, "e").unwrap());
    assert!(!add_type_id(&edges, "e").unwrap());
    assert_eq!(
        circuit
            .load(&edges)
            .dataset("edges/e/edge_type_id")
            .unwrap()
            .as_ints()
            .unwrap(),
        &[-1, -1, -1]
    );
}

// =============================================================================
// Rewire, projection sources, offset correction
// =============================================================================

#[test]
fn rewire_names_population_after_node_populations() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("newname", 2)]);
    let edges = circuit.edges("edges.json", "default", vec![0, 1], vec![1, 0]);

    let name = rewire_edge_population(&edges, &nodes, &nodes, "chemical").unwrap();
    assert_eq!(name, "newname__newname__chemical");

    let c = circuit.load(&edges);
    assert_eq!(get_population_names(&edges).unwrap(), vec![name.clone()]);
    for column in ["source_node_id", "target_node_id"] {
        let attrs = c
            .attrs(&paths::population_column(Category::Edges, &name, column))
            .unwrap();
        assert_eq!(
            attrs.get(paths::NODE_POPULATION_ATTR),
            Some(&AttrValue::Text("newname".into()))
        );
    }
}

#[test]
fn rewire_refuses_ambiguous_node_file() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("a", 1), ("b", 1)]);
    let edges = circuit.edges("edges.json", "default", vec![0], vec![0]);
    assert!(matches!(
        rewire_edge_population(&edges, &nodes, &nodes, "chemical"),
        Err(CurateError::AmbiguousPopulation { .. })
    ));
    assert_eq!(get_population_names(&edges).unwrap(), vec!["default"]);
}

#[test]
fn projection_sources_sized_by_max_or_distinct_ids() {
    let circuit = TestCircuit::new();
    let edges = circuit.edges("proj.json", "proj", vec![10, 12, 10, 15], vec![0, 1, 2, 3]);
    let out = circuit.file("out");

    let raw = create_projection_source_nodes(&edges, &out, "proj_src", false).unwrap();
    assert_eq!(raw, paths::projection_nodes_file(&out, "proj_src"));
    let c = circuit.load(&raw);
    assert_eq!(c.dataset("nodes/proj_src/node_type_id").unwrap().rows(), 16);
    assert_eq!(
        read_strings(&c, Category::Nodes, "proj_src", "0", "model_type").unwrap(),
        vec!["virtual"; 16]
    );

    let fixed = create_projection_source_nodes(&edges, &out, "proj_src", true).unwrap();
    let c = circuit.load(&fixed);
    assert_eq!(c.dataset("nodes/proj_src/node_type_id").unwrap().rows(), 3);
    assert!(!is_categorical(&c, Category::Nodes, "proj_src", "0", "model_type"));
}

#[test]
fn offset_correction_drops_rows_below_offset() {
    let circuit = TestCircuit::new();
    let edges = circuit.edges("proj.json", "proj", vec![10, 3, 12, 9], vec![0, 1, 2, 3]);

    assert_eq!(correct_source_nodes_offset(&edges, None, 10).unwrap(), 2);

    let c = circuit.load(&edges);
    assert_eq!(
        c.dataset("edges/proj/source_node_id").unwrap().as_ints().unwrap(),
        &[0, 2]
    );
    assert_eq!(
        c.dataset("edges/proj/target_node_id").unwrap().as_ints().unwrap(),
        &[0, 2]
    );
    assert_eq!(
        c.dataset("edges/proj/0/syn_weight").unwrap().as_floats().unwrap(),
        &[0.0, 1.0]
    );
}

#[test]
fn offset_correction_rejects_column_shorter_than_its_shape() {
    let circuit = TestCircuit::new();
    let edges = circuit.edges("proj.json", "proj", vec![10, 3, 12, 9], vec![0, 1, 2, 3]);

    let mut raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&edges).unwrap()).unwrap();
    raw["root"]["children"]["edges"]["children"]["proj"]["children"]["0"]["children"]
        ["syn_weight"]["shape"] = serde_json::json!([8]);
    std::fs::write(&edges, serde_json::to_vec(&raw).unwrap()).unwrap();
    let before = std::fs::read(&edges).unwrap();

    let result = correct_source_nodes_offset(&edges, None, 10);
    assert!(matches!(result, Err(CurateError::Container(_))));
    assert_eq!(std::fs::read(&edges).unwrap(), before);
}

// =============================================================================
// Merge
// =============================================================================

#[test]
fn merge_collects_populations_in_name_order() {
    let circuit = TestCircuit::new();
    let first = circuit.nodes("first.json", &[("zeta", 2)]);
    let second = circuit.nodes("second.json", &[("alpha", 1), ("mid", 3)]);
    let output = circuit.file("merged.json");

    let names = merge_h5_files(&[first, second], Category::Nodes, &output).unwrap();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    assert_eq!(get_population_names(&output).unwrap(), names);
    assert_eq!(
        circuit
            .load(&output)
            .dataset("nodes/mid/0/x")
            .unwrap()
            .rows(),
        3
    );
}

#[test]
fn merge_rejects_duplicate_population() {
    let circuit = TestCircuit::new();
    let first = circuit.nodes("first.json", &[("default", 2)]);
    let second = circuit.nodes("second.json", &[("default", 1)]);
    let output = circuit.file("merged.json");

    assert!(matches!(
        merge_h5_files(&[first, second], Category::Nodes, &output),
        Err(CurateError::DuplicatePopulation { .. })
    ));
    assert!(!output.exists());
}

#[test]
fn merge_rejects_wrong_category_and_existing_output() {
    let circuit = TestCircuit::new();
    let edges = circuit.edges("edges.json", "e", vec![0], vec![0]);
    let output = circuit.file("merged.json");
    assert!(matches!(
        merge_h5_files(&[edges.clone()], Category::Nodes, &output),
        Err(CurateError::Schema { .. })
    ));

    let nodes = circuit.nodes("nodes.json", &[("n", 1)]);
    assert!(matches!(
        merge_h5_files(&[nodes], Category::Nodes, &edges),
        Err(CurateError::AlreadyExists(_))
    ));
}

// =============================================================================
// Split
// =============================================================================

#[test]
fn split_writes_partitions_and_edge_pairs() {
    let circuit = TestCircuit::new();
    let mut c = Container::new();
    c.put_dataset("nodes/all/node_type_id", Dataset::ints(vec![-1; 4]))
        .unwrap();
    write_categorical(
        &mut c,
        Category::Nodes,
        "all",
        "0",
        "region",
        &["CA1", "CA3", "CA1", "CA3"],
    )
    .unwrap();
    let nodes = circuit.save("nodes.json", &c);
    // 0:CA1->1:CA3, 2:CA1->0:CA1, 3:CA3->1:CA3
    let edges = circuit.edges("edges.json", "all", vec![0, 2, 3], vec![1, 0, 1]);
    let out = circuit.file("split");

    let written = split_population(&out, "region", &nodes, &edges).unwrap();
    assert_eq!(
        written.nodes.keys().cloned().collect::<Vec<_>>(),
        vec!["CA1", "CA3"]
    );
    let pairs: Vec<(String, String)> = written.edges.keys().cloned().collect();
    assert_eq!(
        pairs,
        vec![
            ("CA1".to_string(), "CA1".to_string()),
            ("CA1".to_string(), "CA3".to_string()),
            ("CA3".to_string(), "CA3".to_string()),
        ]
    );

    let ca3 = circuit.load(&written.nodes["CA3"]);
    assert_eq!(ca3.dataset("nodes/CA3/node_type_id").unwrap().rows(), 2);

    let cross = circuit.load(&written.edges[&("CA1".to_string(), "CA3".to_string())]);
    let population = "CA1__CA3__chemical";
    let column = |name: &str| {
        cross
            .dataset(&paths::population_column(Category::Edges, population, name))
            .unwrap()
            .as_ints()
            .unwrap()
            .to_vec()
    };
    // Node 0 is CA1 local 0; node 1 is CA3 local 0.
    assert_eq!(column("source_node_id"), vec![0]);
    assert_eq!(column("target_node_id"), vec![0]);

    let within = circuit.load(&written.edges[&("CA1".to_string(), "CA1".to_string())]);
    assert_eq!(
        within
            .dataset("edges/CA1__CA1__chemical/source_node_id")
            .unwrap()
            .as_ints()
            .unwrap(),
        &[1]
    );
    assert_eq!(
        within
            .dataset("edges/CA1__CA1__chemical/0/syn_weight")
            .unwrap()
            .as_floats()
            .unwrap(),
        &[0.5]
    );
}

#[test]
fn split_on_missing_attribute_is_not_found() {
    let circuit = TestCircuit::new();
    let nodes = circuit.nodes("nodes.json", &[("all", 2)]);
    let edges = circuit.edges("edges.json", "all", vec![0], vec![1]);
    assert!(matches!(
        split_population(&circuit.file("split"), "region", &nodes, &edges),
        Err(CurateError::NotFound { .. })
    ));
}
