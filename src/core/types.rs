//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Category`] - Top-level container category (nodes or edges)
//! - [`PopulationName`] - Validated population name
//! - [`UtcTimestamp`] - RFC3339 timestamp
//! - [`Fingerprint`] - Content hash of a container tree
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use sonatakit::core::types::{Category, PopulationName};
//!
//! let name = PopulationName::new("thalamus__cortex__chemical").unwrap();
//! assert_eq!(name.as_str(), "thalamus__cortex__chemical");
//!
//! assert!(PopulationName::new("a/b").is_err());
//! assert_eq!(Category::Nodes.type_id_column(), "node_type_id");
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid population name: {0}")]
    InvalidPopulationName(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

/// The top-level category of a container file.
///
/// A SONATA container holds exactly one of these at its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Nodes,
    Edges,
}

impl Category {
    /// Both categories, in canonical order.
    pub const ALL: [Category; 2] = [Category::Nodes, Category::Edges];

    /// Name of the root group holding this category's populations.
    pub fn group_name(self) -> &'static str {
        match self {
            Category::Nodes => "nodes",
            Category::Edges => "edges",
        }
    }

    /// Name of the required per-element type-id column.
    pub fn type_id_column(self) -> &'static str {
        match self {
            Category::Nodes => "node_type_id",
            Category::Edges => "edge_type_id",
        }
    }

    /// Parse a category from its group name.
    ///
    /// # Example
    ///
    /// ```
    /// use sonatakit::core::types::Category;
    ///
    /// assert_eq!(Category::parse("edges").unwrap(), Category::Edges);
    /// assert!(Category::parse("morphologies").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        match s {
            "nodes" => Ok(Category::Nodes),
            "edges" => Ok(Category::Edges),
            other => Err(TypeError::UnknownCategory(other.to_string())),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.group_name())
    }
}

/// A validated population name.
///
/// Population names become a single component of a container path, so:
/// - Cannot be empty
/// - Cannot be `.` or `..`
/// - Cannot contain `/`
/// - Cannot contain ASCII control characters
///
/// # Example
///
/// ```
/// use sonatakit::core::types::PopulationName;
///
/// let name = PopulationName::new("not-default").unwrap();
/// assert_eq!(name.as_str(), "not-default");
///
/// assert!(PopulationName::new("").is_err());
/// assert!(PopulationName::new("..").is_err());
/// assert!(PopulationName::new("nodes/extra").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PopulationName(String);

impl PopulationName {
    /// Create a new validated population name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPopulationName` if the name cannot be used
    /// as a container path component.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidPopulationName(
                "population name cannot be empty".into(),
            ));
        }
        if name == "." || name == ".." {
            return Err(TypeError::InvalidPopulationName(format!(
                "population name cannot be '{name}'"
            )));
        }
        if name.contains('/') {
            return Err(TypeError::InvalidPopulationName(
                "population name cannot contain '/'".into(),
            ));
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidPopulationName(
                "population name cannot contain control characters".into(),
            ));
        }
        Ok(())
    }

    /// Get the population name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PopulationName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PopulationName> for String {
    fn from(name: PopulationName) -> Self {
        name.0
    }
}

impl AsRef<str> for PopulationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PopulationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A UTC timestamp in RFC3339 format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Create a timestamp for the current moment.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A content hash over a container tree.
///
/// Two containers with the same groups, datasets, and attributes have the
/// same fingerprint regardless of when or where they were written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint over a canonical byte rendering.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
