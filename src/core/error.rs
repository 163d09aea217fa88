//! core::error
//!
//! Error taxonomy shared by curation, simplification, and remapping.
//!
//! # Categories
//!
//! - Shape of the container: [`CurateError::Schema`]
//! - Population addressing: [`CurateError::AmbiguousPopulation`],
//!   [`CurateError::NotFound`], [`CurateError::DuplicatePopulation`]
//! - Attribute writes: [`CurateError::ShapeMismatch`],
//!   [`CurateError::AlreadyExists`]
//! - Morphology structure: [`CurateError::InvariantViolation`]
//!
//! Operations fail fast on the first error. Because containers are saved
//! atomically, a failed operation leaves its destination untouched.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::container::ContainerError;
use crate::core::ops::lock::LockError;
use crate::core::types::TypeError;

/// Errors from curation and reindexing operations.
#[derive(Debug, Error)]
pub enum CurateError {
    /// The container does not match the expected category/population shape.
    #[error("schema error in '{path}': {message}")]
    Schema { path: PathBuf, message: String },

    /// A population name was omitted but several candidates exist.
    #[error("'{path}' holds several populations ({}); name one explicitly", .candidates.join(", "))]
    AmbiguousPopulation {
        path: PathBuf,
        candidates: Vec<String>,
    },

    /// A named population, attribute, or morphology is absent.
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    /// An attribute overwrite with an incompatible shape or dtype.
    #[error("cannot overwrite '{attribute}': {message}")]
    ShapeMismatch { attribute: String, message: String },

    /// A population name collides within one category.
    #[error("duplicate {category} population '{name}'")]
    DuplicatePopulation { category: String, name: String },

    /// A morphology or reference breaks a structural invariant.
    #[error("invariant violation in '{subject}': {message}")]
    InvariantViolation { subject: String, message: String },

    /// An existing attribute or output would be replaced without consent.
    #[error("refusing to overwrite existing {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    InvalidName(#[from] TypeError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to (de)serialize '{path}': {message}")]
    Json { path: PathBuf, message: String },
}

impl CurateError {
    pub(crate) fn schema(path: &std::path::Path, message: impl Into<String>) -> Self {
        CurateError::Schema {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        CurateError::NotFound {
            what,
            name: name.into(),
        }
    }

    pub(crate) fn invariant(subject: impl Into<String>, message: impl Into<String>) -> Self {
        CurateError::InvariantViolation {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        CurateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result alias for curation operations.
pub type CurateResult<T> = Result<T, CurateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_lists_candidates() {
        let err = CurateError::AmbiguousPopulation {
            path: PathBuf::from("nodes.json"),
            candidates: vec!["a".into(), "b".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("a, b"));
        assert!(msg.contains("nodes.json"));
    }

    #[test]
    fn not_found_names_kind() {
        let err = CurateError::not_found("population", "unknown");
        assert_eq!(err.to_string(), "population not found: unknown");
    }
}
