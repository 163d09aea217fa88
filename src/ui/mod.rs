//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Output formatting, display, and log initialization
//!
//! # Design
//!
//! All console output goes through this module so quiet and debug modes
//! behave the same for every command.

pub mod output;
