//! Per-transfer file metadata, exchanged as the first handshake frame.
//!
//! The manifest describes the file without carrying any of its bytes. It is
//! serialized as self-describing UTF-8 JSON so either side can be upgraded
//! independently as long as the required fields keep their names.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FerryError;

/// Metadata for a single file transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Leaf file name; never contains a path separator.
    pub file_name: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Unix permission bits (0o644 on platforms without a mode).
    pub file_mode: u32,
    /// Last-modified timestamp.
    pub modified: DateTime<Utc>,
    /// Optional content hash, hex-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Manifest {
    /// Build a manifest from filesystem metadata. Reads only the metadata,
    /// never the file body.
    pub fn from_path(path: &Path) -> Result<Self, FerryError> {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FerryError::SourceNotFound {
                path: path.to_path_buf(),
            },
            _ => FerryError::Io { source: e },
        })?;
        if !meta.is_file() {
            return Err(FerryError::ManifestInvalid(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                FerryError::ManifestInvalid(format!("'{}' has no file name", path.display()))
            })?;

        #[cfg(unix)]
        let file_mode = {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode()
        };
        #[cfg(not(unix))]
        let file_mode = 0o644;

        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Manifest {
            file_name,
            file_size: meta.len(),
            file_mode,
            modified,
            hash: None,
        })
    }

    /// Serialize to the wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FerryError> {
        self.validate()?;
        serde_json::to_vec(self).map_err(|e| FerryError::ManifestInvalid(e.to_string()))
    }

    /// Parse and validate a manifest from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FerryError> {
        let manifest: Manifest =
            serde_json::from_slice(bytes).map_err(|e| FerryError::ManifestInvalid(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Enforce the manifest invariants: non-empty leaf name with no path
    /// separators. A name like `../../etc/passwd` from a hostile sender must
    /// never reach the filesystem layer.
    pub fn validate(&self) -> Result<(), FerryError> {
        if self.file_name.is_empty() {
            return Err(FerryError::ManifestInvalid("empty file name".into()));
        }
        if self.file_name.contains('/') || self.file_name.contains('\\') {
            return Err(FerryError::ManifestInvalid(format!(
                "file name '{}' contains a path separator",
                self.file_name
            )));
        }
        if self.file_name == "." || self.file_name == ".." {
            return Err(FerryError::ManifestInvalid(format!(
                "file name '{}' is not a valid leaf name",
                self.file_name
            )));
        }
        Ok(())
    }
}
