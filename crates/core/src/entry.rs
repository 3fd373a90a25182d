//! Directory entry snapshots

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::time::UNIX_EPOCH;

/// One entry of a directory listing, captured at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Name of the entry inside its containing directory
    pub name: String,
    /// True if the entry is a directory
    pub is_dir: bool,
    /// Last modification time, milliseconds since the Unix epoch
    pub modified_at: u64,
    /// Size in bytes
    pub size: u64,
}

impl DirectoryEntry {
    /// Create a file entry
    pub fn file(name: impl Into<String>, modified_at: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            modified_at,
            size,
        }
    }

    /// Create a directory entry
    pub fn dir(name: impl Into<String>, modified_at: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            modified_at,
            size: 0,
        }
    }

    /// Build an entry from on-disk metadata
    ///
    /// A modification time before the epoch (or one the platform cannot
    /// report) is recorded as 0.
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            name: name.into(),
            is_dir: metadata.is_dir(),
            modified_at,
            size: metadata.len(),
        }
    }
}
