//! sonata
//!
//! Node and edge population curation.
//!
//! # Modules
//!
//! - [`library`] - Categorical attribute encoding
//! - [`population`] - Population addressing, rename, attribute writes
//! - [`curate`] - Rewire, projection sources, offset correction, merge
//! - [`split`] - Attribute-based population split

pub mod curate;
pub mod library;
pub mod population;
pub mod split;
