//! core::ops
//!
//! Container locking.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive per-container lock
//!
//! # Architecture
//!
//! Every mutating operation:
//! 1. Acquires the container's exclusive lock
//! 2. Loads the container
//! 3. Applies its edit in memory
//! 4. Saves atomically (temp file + rename)
//! 5. Releases the lock on drop, on every exit path

pub mod lock;

pub use lock::{ContainerLock, LockError};
