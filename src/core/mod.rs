//! core
//!
//! Core domain types, storage, and shared infrastructure for sonatakit.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Category, PopulationName, Fingerprint
//! - [`container`] - Hierarchical group/dataset container and atomic I/O
//! - [`error`] - Curation error taxonomy
//! - [`ops`] - Exclusive container locking
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized container path and file naming
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid names from reaching a container
//! - On-disk formats are strict and versioned
//! - Writes are atomic

pub mod config;
pub mod container;
pub mod error;
pub mod ops;
pub mod paths;
pub mod types;
