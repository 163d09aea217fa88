//! core::container::io
//!
//! On-disk form of a container and the atomic save protocol.
//!
//! # Format
//!
//! A container file is a single JSON document:
//!
//! ```json
//! { "format": "sonatakit-container", "version": 1,
//!   "written_at": "2024-01-01T00:00:00Z", "root": { ... } }
//! ```
//!
//! # Atomicity
//!
//! Saves never write the destination in place. The document is written to a
//! uniquely named temporary sibling, synced, and renamed over the
//! destination. Readers see either the old file or the new one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Container, ContainerError, Group};
use crate::core::types::UtcTimestamp;

/// Format tag stored in every container file.
pub const FORMAT_TAG: &str = "sonatakit-container";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    format: &'a str,
    version: u32,
    written_at: UtcTimestamp,
    root: &'a Group,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    format: String,
    version: u32,
    #[allow(dead_code)]
    written_at: Option<UtcTimestamp>,
    root: Group,
}

impl Container {
    /// Load a container from `path`.
    ///
    /// # Errors
    ///
    /// - [`ContainerError::Read`] if the file cannot be read
    /// - [`ContainerError::Parse`] if it is not a container document
    /// - [`ContainerError::UnsupportedFormat`] on a foreign format or version
    /// - [`ContainerError::BadShape`] if a dataset's shape does not match its
    ///   values
    pub fn load(path: &Path) -> Result<Self, ContainerError> {
        let bytes = fs::read(path).map_err(|source| ContainerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let envelope: EnvelopeIn =
            serde_json::from_slice(&bytes).map_err(|e| ContainerError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if envelope.format != FORMAT_TAG {
            return Err(ContainerError::UnsupportedFormat(envelope.format));
        }
        if envelope.version != FORMAT_VERSION {
            return Err(ContainerError::UnsupportedFormat(format!(
                "{} version {}",
                envelope.format, envelope.version
            )));
        }
        let container = Container::from_root(envelope.root);
        container.validate_shapes()?;
        tracing::debug!(path = %path.display(), "loaded container");
        Ok(container)
    }

    /// Save the container to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> Result<(), ContainerError> {
        let envelope = EnvelopeOut {
            format: FORMAT_TAG,
            version: FORMAT_VERSION,
            written_at: UtcTimestamp::now(),
            root: self.root(),
        };
        let bytes =
            serde_json::to_vec(&envelope).map_err(|e| ContainerError::Serialize(e.to_string()))?;
        write_atomic(path, &bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved container");
        Ok(())
    }
}

/// Path of the temporary sibling used while replacing `path`.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Write `bytes` to `path` via temp file + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ContainerError> {
    let write_err = |source| ContainerError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let temp_path = temp_sibling(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }
    Ok(())
}
