//! morphology
//!
//! Neuron morphology trees, invariant checks, and simplification.
//!
//! # Modules
//!
//! - [`tree`] - Section arena and ordering/unifurcation predicates
//! - [`check`] - Batch invariant diagnostic
//! - [`simplify`] - Unifurcation removal and update records

pub mod check;
pub mod simplify;
pub mod tree;

pub use check::{check_morphology_invariants, load_morphdb, InvariantReport};
pub use simplify::{simplify, ReindexUpdate, UpdateArtifact};
pub use tree::{Morphology, Point, Section};
