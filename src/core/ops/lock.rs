//! core::ops::lock
//!
//! Exclusive per-file writer lock for container operations.
//!
//! # Architecture
//!
//! Curation operations rewrite whole container files. The container lock
//! ensures only one sonatakit process rewrites a given file at a time, so
//! two concurrent renames cannot interleave their load/save cycles.
//!
//! # Storage
//!
//! - `<dir>/.<file>.lock` - Lock file with OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock must be held from load until the atomic save completes
//! - Lock is automatically released on drop (RAII pattern)
//! - Lock acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```no_run
//! use sonatakit::core::ops::lock::ContainerLock;
//! use std::path::Path;
//!
//! let lock = ContainerLock::acquire(Path::new("edges.json")).unwrap();
//! // load, mutate, save ...
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("'{0}' is locked by another sonatakit process")]
    AlreadyLocked(PathBuf),

    /// Failed to create lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on one container file.
///
/// The lock is released when this guard is dropped, including on early
/// returns through `?`.
#[derive(Debug)]
pub struct ContainerLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle with the lock held.
    file: Option<File>,
}

impl ContainerLock {
    /// Attempt to lock `target` for writing.
    ///
    /// The target itself does not need to exist yet; the lock lives in a
    /// hidden sibling file.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(target: &Path) -> Result<Self, LockError> {
        let path = paths::lock_path(target);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LockError::CreateFailed(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::trace!(lock = %path.display(), "acquired container lock");
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::AlreadyLocked(target.to_path_buf()))
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly and remove the lock file.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
            let _ = fs::remove_file(&self.path);
        }
        Ok(())
    }
}

impl Drop for ContainerLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
            let _ = fs::remove_file(&self.path);
        }
    }
}
