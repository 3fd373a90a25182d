//! Dirwatch Core - directory snapshots for the watch engine
//!
//! This crate provides the filesystem side the watcher depends on:
//! - Directory entry snapshots (name, kind, mtime, size)
//! - The `FileSystem` provider trait, rooted at a served directory
//! - A local-disk provider and an in-memory provider
//! - `/`-separated virtual path helpers

pub mod entry;
pub mod fs;
pub mod local;
pub mod memory;
pub mod path;

// Re-exports
pub use entry::DirectoryEntry;
pub use fs::{FileSystem, FsError};
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, FsError>;
