//! core::paths
//!
//! Centralized path routing for container layouts and output files.
//!
//! # Architecture
//!
//! Every container path (`nodes/<population>/0/@library/<attr>`) and every
//! derived output file name (`nodes_<population>.json`) is computed here.
//! No other module formats these strings by hand.
//!
//! # Container Layout
//!
//! ```text
//! /<category>/<population>/<type_id column>
//! /<category>/<population>/<group id>/<attribute>
//! /<category>/<population>/<group id>/@library/<attribute>
//! /edges/<population>/{source,target}_node_id   (attr: node_population)
//! /<category>/<population>/{node,edge}_group_id, {node,edge}_group_index
//! ```
//!
//! # Example
//!
//! ```
//! use sonatakit::core::paths;
//! use sonatakit::core::types::Category;
//!
//! assert_eq!(paths::population(Category::Nodes, "default"), "nodes/default");
//! assert_eq!(
//!     paths::library(Category::Nodes, "default", "0", "model_type"),
//!     "nodes/default/0/@library/model_type"
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::core::container::join;
use crate::core::types::Category;

/// Default file extension for containers.
pub const CONTAINER_EXTENSION: &str = "json";

/// Default name of the persisted morphology update artifact.
pub const UPDATES_FILE: &str = "morph_updates.json";

/// Group holding Library arrays inside a population group.
pub const LIBRARY_GROUP: &str = "@library";

/// Default group id for population attributes.
pub const DEFAULT_GROUP: &str = "0";

pub const SOURCE_NODE_ID: &str = "source_node_id";
pub const TARGET_NODE_ID: &str = "target_node_id";
pub const INDICES_GROUP: &str = "indices";

/// Attribute on `source_node_id`/`target_node_id` naming the node population.
pub const NODE_POPULATION_ATTR: &str = "node_population";

/// Per-row column naming the attribute group of each element.
pub fn group_id_column(category: Category) -> &'static str {
    match category {
        Category::Nodes => "node_group_id",
        Category::Edges => "edge_group_id",
    }
}

/// Per-row column giving each element's row inside its attribute group.
pub fn group_index_column(category: Category) -> &'static str {
    match category {
        Category::Nodes => "node_group_index",
        Category::Edges => "edge_group_index",
    }
}

/// Path of a population group.
pub fn population(category: Category, name: &str) -> String {
    join(&[category.group_name(), name])
}

/// Path of a population-level column (e.g. `source_node_id`).
pub fn population_column(category: Category, name: &str, column: &str) -> String {
    join(&[category.group_name(), name, column])
}

/// Path of a numbered attribute group inside a population.
pub fn group(category: Category, name: &str, group_id: &str) -> String {
    join(&[category.group_name(), name, group_id])
}

/// Path of an attribute column inside a population group.
pub fn attribute(category: Category, name: &str, group_id: &str, attribute: &str) -> String {
    join(&[category.group_name(), name, group_id, attribute])
}

/// Path of the Library array for a categorical attribute.
pub fn library(category: Category, name: &str, group_id: &str, attribute: &str) -> String {
    join(&[category.group_name(), name, group_id, LIBRARY_GROUP, attribute])
}

/// Hidden lock file guarding writes to `target`.
///
/// # Example
///
/// ```
/// use sonatakit::core::paths::lock_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(
///     lock_path(Path::new("/data/edges.json")),
///     PathBuf::from("/data/.edges.json.lock")
/// );
/// ```
pub fn lock_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.lock", name))
}

/// File name for a container with the given stem.
pub fn container_file(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, CONTAINER_EXTENSION))
}

/// Output file for synthesized projection source nodes.
pub fn projection_nodes_file(dir: &Path, population: &str) -> PathBuf {
    container_file(dir, &format!("nodes_{}", population))
}

/// Output node file for one partition of a split.
pub fn split_nodes_file(dir: &Path, partition: &str) -> PathBuf {
    container_file(dir, &format!("nodes_{}", partition))
}

/// Output edge file for one (source, target) partition pair of a split.
pub fn split_edges_file(dir: &Path, source: &str, target: &str) -> PathBuf {
    container_file(dir, &format!("edges_{}__{}", source, target))
}

/// Name of a rewired edge population.
///
/// # Example
///
/// ```
/// use sonatakit::core::paths::edge_population_name;
///
/// assert_eq!(
///     edge_population_name("newname", "newname", "chemical"),
///     "newname__newname__chemical"
/// );
/// ```
pub fn edge_population_name(source: &str, target: &str, type_label: &str) -> String {
    format!("{}__{}__{}", source, target, type_label)
}

/// Morphology file for a morphology name inside a directory.
pub fn morphology_file(dir: &Path, name: &str) -> PathBuf {
    container_file(dir, name)
}

/// Morphology name for a file in a morphology directory, if it looks like
/// one (right extension, not hidden, not the update artifact).
pub fn morphology_name(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') || file_name == UPDATES_FILE {
        return None;
    }
    if path.extension()?.to_str()? != CONTAINER_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str().map(str::to_string)
}
