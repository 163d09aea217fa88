//! core::container
//!
//! Hierarchical group/dataset container used for node, edge, and
//! morphology files.
//!
//! # Architecture
//!
//! A container is a tree. Interior nodes are [`Group`]s, leaves are
//! [`Dataset`]s. Both carry a small attribute map. Nodes are addressed by
//! slash-separated paths relative to the root (`"nodes/default/0/x"`).
//!
//! Children are kept in a `BTreeMap`, so every listing comes back in
//! sorted-name order no matter the order in which nodes were written.
//!
//! # Persistence
//!
//! See [`io`] for the on-disk envelope and the atomic save protocol.
//!
//! # Example
//!
//! ```
//! use sonatakit::core::container::{Container, Dataset};
//!
//! let mut c = Container::new();
//! c.create_group("nodes/default/0").unwrap();
//! c.put_dataset("nodes/default/node_type_id", Dataset::ints(vec![-1, -1])).unwrap();
//!
//! assert!(c.contains("nodes/default/0"));
//! assert_eq!(c.child_names("nodes").unwrap(), vec!["default".to_string()]);
//! ```

pub mod io;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::Fingerprint;

/// Errors from container access and persistence.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to read container '{path}': {source}")]
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write container '{path}': {source}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse container '{path}': {message}")]
    Parse {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("failed to serialize container: {0}")]
    Serialize(String),

    #[error("unsupported container format: {0}")]
    UnsupportedFormat(String),

    #[error("no such node: {0}")]
    NotFound(String),

    #[error("node already exists: {0}")]
    Exists(String),

    #[error("not a group: {0}")]
    NotAGroup(String),

    #[error("not a dataset: {0}")]
    NotADataset(String),

    #[error("invalid path: '{0}'")]
    InvalidPath(String),

    #[error("dataset '{path}' has shape {shape:?} but holds {len} values")]
    BadShape {
        path: String,
        shape: Vec<usize>,
        len: usize,
    },
}

/// Scalar attribute attached to a group or dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

/// Typed, flat storage of a dataset (row-major).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum Data {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl Data {
    /// Number of scalar values held.
    pub fn len(&self) -> usize {
        match self {
            Data::Int(v) => v.len(),
            Data::Float(v) => v.len(),
            Data::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short dtype name for messages.
    pub fn dtype(&self) -> &'static str {
        match self {
            Data::Int(_) => "int",
            Data::Float(_) => "float",
            Data::Text(_) => "text",
        }
    }

    /// Keep only the rows selected by `keep`, where each row has `width`
    /// scalar values.
    pub fn select_rows(&self, keep: &[usize], width: usize) -> Data {
        fn pick<T: Clone>(values: &[T], keep: &[usize], width: usize) -> Vec<T> {
            keep.iter()
                .flat_map(|&row| values[row * width..(row + 1) * width].iter().cloned())
                .collect()
        }
        match self {
            Data::Int(v) => Data::Int(pick(v, keep, width)),
            Data::Float(v) => Data::Float(pick(v, keep, width)),
            Data::Text(v) => Data::Text(pick(v, keep, width)),
        }
    }
}

/// A leaf node: a shaped, typed array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub shape: Vec<usize>,
    pub data: Data,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl Dataset {
    /// A one-dimensional dataset over `data`.
    pub fn new(data: Data) -> Self {
        Self {
            shape: vec![data.len()],
            data,
            attrs: BTreeMap::new(),
        }
    }

    pub fn ints(values: Vec<i64>) -> Self {
        Self::new(Data::Int(values))
    }

    pub fn floats(values: Vec<f64>) -> Self {
        Self::new(Data::Float(values))
    }

    pub fn texts(values: Vec<String>) -> Self {
        Self::new(Data::Text(values))
    }

    /// A two-dimensional dataset of `rows` x `width`.
    pub fn matrix(data: Data, width: usize) -> Self {
        let rows = if width == 0 { 0 } else { data.len() / width };
        Self {
            shape: vec![rows, width],
            data,
            attrs: BTreeMap::new(),
        }
    }

    /// Number of rows (the first dimension).
    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Scalar values per row.
    pub fn row_width(&self) -> usize {
        self.shape.iter().skip(1).product()
    }

    pub fn as_ints(&self) -> Option<&[i64]> {
        match &self.data {
            Data::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match &self.data {
            Data::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_texts(&self) -> Option<&[String]> {
        match &self.data {
            Data::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Keep only the selected rows, preserving their relative order.
    pub fn select_rows(&self, keep: &[usize]) -> Dataset {
        let width = self.row_width();
        let mut shape = self.shape.clone();
        if let Some(first) = shape.first_mut() {
            *first = keep.len();
        }
        Dataset {
            shape,
            data: self.data.select_rows(keep, width),
            attrs: self.attrs.clone(),
        }
    }

    fn check_shape(&self, path: &str) -> Result<(), ContainerError> {
        let expected: usize = self.shape.iter().product();
        if expected != self.data.len() {
            return Err(ContainerError::BadShape {
                path: path.to_string(),
                shape: self.shape.clone(),
                len: self.data.len(),
            });
        }
        Ok(())
    }
}

/// An interior node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub children: BTreeMap<String, Node>,
}

/// Either kind of container node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
}

impl Node {
    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        match self {
            Node::Group(g) => &g.attrs,
            Node::Dataset(d) => &d.attrs,
        }
    }

    pub fn attrs_mut(&mut self) -> &mut BTreeMap<String, AttrValue> {
        match self {
            Node::Group(g) => &mut g.attrs,
            Node::Dataset(d) => &mut d.attrs,
        }
    }
}

/// Split a container path into components, rejecting empty or relative
/// components.
fn components(path: &str) -> Result<Vec<&str>, ContainerError> {
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.iter().any(|p| *p == "." || *p == "..") {
        return Err(ContainerError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Join path components with `/`.
pub fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.trim_matches('/'))
        .collect::<Vec<_>>()
        .join("/")
}

/// An in-memory container tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    root: Group,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing root group.
    pub fn from_root(root: Group) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Look up any node by path. The empty path is not a node.
    pub fn node(&self, path: &str) -> Option<&Node> {
        let parts = components(path).ok()?;
        let (last, parents) = parts.split_last()?;
        let mut group = &self.root;
        for part in parents {
            match group.children.get(*part)? {
                Node::Group(g) => group = g,
                Node::Dataset(_) => return None,
            }
        }
        group.children.get(*last)
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
        let parts = components(path).ok()?;
        let (last, parents) = parts.split_last()?;
        let mut group = &mut self.root;
        for part in parents {
            match group.children.get_mut(*part)? {
                Node::Group(g) => group = g,
                Node::Dataset(_) => return None,
            }
        }
        group.children.get_mut(*last)
    }

    /// Whether a node exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.node(path).is_some()
    }

    /// Borrow the group at `path`. The empty path is the root.
    pub fn group(&self, path: &str) -> Result<&Group, ContainerError> {
        if components(path)?.is_empty() {
            return Ok(&self.root);
        }
        match self.node(path) {
            Some(Node::Group(g)) => Ok(g),
            Some(Node::Dataset(_)) => Err(ContainerError::NotAGroup(path.to_string())),
            None => Err(ContainerError::NotFound(path.to_string())),
        }
    }

    /// Mutably borrow the group at `path`.
    pub fn group_mut(&mut self, path: &str) -> Result<&mut Group, ContainerError> {
        if components(path)?.is_empty() {
            return Ok(&mut self.root);
        }
        match self.node_mut(path) {
            Some(Node::Group(g)) => Ok(g),
            Some(Node::Dataset(_)) => Err(ContainerError::NotAGroup(path.to_string())),
            None => Err(ContainerError::NotFound(path.to_string())),
        }
    }

    /// Borrow the dataset at `path`.
    pub fn dataset(&self, path: &str) -> Result<&Dataset, ContainerError> {
        match self.node(path) {
            Some(Node::Dataset(d)) => Ok(d),
            Some(Node::Group(_)) => Err(ContainerError::NotADataset(path.to_string())),
            None => Err(ContainerError::NotFound(path.to_string())),
        }
    }

    /// Mutably borrow the dataset at `path`.
    pub fn dataset_mut(&mut self, path: &str) -> Result<&mut Dataset, ContainerError> {
        match self.node_mut(path) {
            Some(Node::Dataset(d)) => Ok(d),
            Some(Node::Group(_)) => Err(ContainerError::NotADataset(path.to_string())),
            None => Err(ContainerError::NotFound(path.to_string())),
        }
    }

    /// Names of the children of the group at `path`, sorted.
    pub fn child_names(&self, path: &str) -> Result<Vec<String>, ContainerError> {
        Ok(self.group(path)?.children.keys().cloned().collect())
    }

    /// Create the group at `path` along with any missing intermediate
    /// groups. Existing groups are reused.
    pub fn create_group(&mut self, path: &str) -> Result<&mut Group, ContainerError> {
        let parts = components(path)?;
        let mut group = &mut self.root;
        let mut walked = Vec::with_capacity(parts.len());
        for part in parts {
            walked.push(part);
            let child = group
                .children
                .entry(part.to_string())
                .or_insert_with(|| Node::Group(Group::default()));
            group = match child {
                Node::Group(g) => g,
                Node::Dataset(_) => return Err(ContainerError::NotAGroup(walked.join("/"))),
            };
        }
        Ok(group)
    }

    /// Insert or replace the dataset at `path`, creating parent groups.
    pub fn put_dataset(&mut self, path: &str, dataset: Dataset) -> Result<(), ContainerError> {
        dataset.check_shape(path)?;
        let parts = components(path)?;
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| ContainerError::InvalidPath(path.to_string()))?;
        let parent = self.create_group(&parents.join("/"))?;
        if let Some(Node::Group(_)) = parent.children.get(*last) {
            return Err(ContainerError::NotADataset(path.to_string()));
        }
        parent
            .children
            .insert(last.to_string(), Node::Dataset(dataset));
        Ok(())
    }

    /// Insert a whole node at `path`; fails if something is already there.
    pub fn put_node(&mut self, path: &str, node: Node) -> Result<(), ContainerError> {
        let parts = components(path)?;
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| ContainerError::InvalidPath(path.to_string()))?;
        let parent = self.create_group(&parents.join("/"))?;
        if parent.children.contains_key(*last) {
            return Err(ContainerError::Exists(path.to_string()));
        }
        parent.children.insert(last.to_string(), node);
        Ok(())
    }

    /// Remove and return the node at `path`.
    pub fn remove(&mut self, path: &str) -> Result<Node, ContainerError> {
        let parts = components(path)?;
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| ContainerError::InvalidPath(path.to_string()))?;
        let parent = self.group_mut(&parents.join("/"))?;
        parent
            .children
            .remove(*last)
            .ok_or_else(|| ContainerError::NotFound(path.to_string()))
    }

    /// Move the node at `from` to `to`; the destination must be free.
    pub fn move_node(&mut self, from: &str, to: &str) -> Result<(), ContainerError> {
        if self.contains(to) {
            return Err(ContainerError::Exists(to.to_string()));
        }
        let node = self.remove(from)?;
        self.put_node(to, node)
    }

    /// Attributes of the node at `path` (the root for the empty path).
    pub fn attrs(&self, path: &str) -> Result<&BTreeMap<String, AttrValue>, ContainerError> {
        if components(path)?.is_empty() {
            return Ok(&self.root.attrs);
        }
        self.node(path)
            .map(Node::attrs)
            .ok_or_else(|| ContainerError::NotFound(path.to_string()))
    }

    /// Set an attribute on the node at `path`.
    pub fn set_attr(
        &mut self,
        path: &str,
        key: &str,
        value: AttrValue,
    ) -> Result<(), ContainerError> {
        let attrs = if components(path)?.is_empty() {
            &mut self.root.attrs
        } else {
            self.node_mut(path)
                .map(Node::attrs_mut)
                .ok_or_else(|| ContainerError::NotFound(path.to_string()))?
        };
        attrs.insert(key.to_string(), value);
        Ok(())
    }

    /// Content fingerprint of the whole tree.
    pub fn fingerprint(&self) -> Result<Fingerprint, ContainerError> {
        let bytes =
            serde_json::to_vec(&self.root).map_err(|e| ContainerError::Serialize(e.to_string()))?;
        Ok(Fingerprint::of_bytes(&bytes))
    }

    /// Check that every dataset holds exactly as many values as its shape
    /// declares.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::BadShape`] for the first mismatch found.
    pub fn validate_shapes(&self) -> Result<(), ContainerError> {
        let mut pending: Vec<(String, &Group)> = vec![(String::new(), &self.root)];
        while let Some((prefix, group)) = pending.pop() {
            for (name, node) in &group.children {
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}/{}", prefix, name)
                };
                match node {
                    Node::Group(child) => pending.push((path, child)),
                    Node::Dataset(dataset) => dataset.check_shape(&path)?,
                }
            }
        }
        Ok(())
    }
}
