//! sonatakit - Curation and morphology reindexing for SONATA-style circuits
//!
//! sonatakit edits node and edge population containers in place (rename,
//! rewire, offset correction, merge, split), checks and simplifies neuron
//! morphologies, and carries the resulting section renumbering through to
//! the synapse references stored on edges.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the library)
//! - [`sonata`] - Population curation over node/edge containers
//! - [`morphology`] - Morphology trees, invariant checks, simplification
//! - [`reindex`] - Synapse reference remapping and section positions
//! - [`core`] - Container format, domain types, paths, config, locking
//! - [`ui`] - Console output and log initialization
//!
//! # Correctness Invariants
//!
//! 1. Every container edit holds the container's exclusive lock
//! 2. Containers are replaced atomically, so a failed operation leaves the
//!    previous content on disk
//! 3. Simplification never modifies its input directory
//! 4. Remapping a synapse reference preserves the physical point it names

pub mod cli;
pub mod core;
pub mod morphology;
pub mod reindex;
pub mod sonata;
pub mod ui;
