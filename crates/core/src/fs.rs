//! Filesystem provider interface

use crate::entry::DirectoryEntry;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from filesystem providers
#[derive(Error, Debug)]
pub enum FsError {
    #[error("{path}: no such file or directory")]
    NotFound { path: String },

    #[error("{path}: not a directory")]
    NotADirectory { path: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Map an I/O error on `path`, keeping not-found distinct
    pub fn from_io(path: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound {
                path: path.to_string(),
            },
            _ => FsError::Io {
                path: path.to_string(),
                source,
            },
        }
    }
}

/// Snapshot access to a served directory tree
///
/// Every path is virtual: `/`-separated and relative to the provider's root.
/// Implementations must be shareable between request threads and the watch
/// engine's polling thread.
pub trait FileSystem: Send + Sync {
    /// List the entries directly inside `dir`
    fn list(&self, dir: &str) -> Result<Vec<DirectoryEntry>, FsError>;

    /// Snapshot a single entry, or `None` if it does not exist
    fn lookup(&self, path: &str) -> Option<DirectoryEntry>;

    /// Check whether `path` exists
    fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Check whether `path` exists and is a directory
    fn is_dir(&self, path: &str) -> bool {
        self.lookup(path).map(|e| e.is_dir).unwrap_or(false)
    }

    /// Read the full contents of a file
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Absolute on-disk location of a virtual path
    fn host_path(&self, path: &str) -> PathBuf;
}
