//! In-memory provider
//!
//! Used to drive the watch engine without a real disk: tests populate the
//! tree, inject kernel records for the same names, and check what the
//! engine reports.

use crate::entry::DirectoryEntry;
use crate::fs::{FileSystem, FsError};
use crate::path;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    modified_at: u64,
    contents: Vec<u8>,
}

/// Filesystem provider holding a directory tree in memory
///
/// `host_root` only determines what `host_path` reports; nothing under it
/// is ever touched.
#[derive(Debug)]
pub struct MemoryFileSystem {
    host_root: PathBuf,
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl MemoryFileSystem {
    /// Create an empty tree containing only `/`
    pub fn new(host_root: impl Into<PathBuf>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                is_dir: true,
                modified_at: 0,
                contents: Vec::new(),
            },
        );

        Self {
            host_root: host_root.into(),
            nodes: RwLock::new(nodes),
        }
    }

    /// Add a directory `name` inside `parent`
    pub fn add_dir(&self, parent: &str, name: &str, modified_at: u64) -> Result<(), FsError> {
        self.insert(parent, name, Node {
            is_dir: true,
            modified_at,
            contents: Vec::new(),
        })
    }

    /// Add a file `name` inside `parent`
    pub fn add_file(
        &self,
        parent: &str,
        name: &str,
        modified_at: u64,
        contents: impl Into<Vec<u8>>,
    ) -> Result<(), FsError> {
        self.insert(parent, name, Node {
            is_dir: false,
            modified_at,
            contents: contents.into(),
        })
    }

    /// Remove `path` and everything below it; returns false if absent
    pub fn remove(&self, path: &str) -> bool {
        let key = path::normalize(path);
        if key == "/" {
            return false;
        }

        let mut nodes = self.nodes.write();
        if nodes.remove(&key).is_none() {
            return false;
        }

        let prefix = format!("{}/", key);
        nodes.retain(|k, _| !k.starts_with(&prefix));
        true
    }

    fn insert(&self, parent: &str, name: &str, node: Node) -> Result<(), FsError> {
        let parent_key = path::normalize(parent);
        let mut nodes = self.nodes.write();

        match nodes.get(&parent_key) {
            Some(p) if p.is_dir => {}
            Some(_) => return Err(FsError::NotADirectory { path: parent_key }),
            None => return Err(FsError::NotFound { path: parent_key }),
        }

        nodes.insert(path::join(&parent_key, name), node);
        Ok(())
    }
}

impl FileSystem for MemoryFileSystem {
    fn list(&self, dir: &str) -> Result<Vec<DirectoryEntry>, FsError> {
        let key = path::normalize(dir);
        let nodes = self.nodes.read();

        match nodes.get(&key) {
            Some(n) if n.is_dir => {}
            Some(_) => return Err(FsError::NotADirectory { path: key }),
            None => return Err(FsError::NotFound { path: key }),
        }

        Ok(nodes
            .iter()
            .filter(|(k, _)| k.as_str() != "/" && path::parent(k) == key)
            .map(|(k, n)| to_entry(k, n))
            .collect())
    }

    fn lookup(&self, path: &str) -> Option<DirectoryEntry> {
        let key = path::normalize(path);
        self.nodes.read().get(&key).map(|n| to_entry(&key, n))
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let key = path::normalize(path);
        match self.nodes.read().get(&key) {
            Some(n) if !n.is_dir => Ok(n.contents.clone()),
            Some(_) => Err(FsError::Io {
                path: key,
                source: std::io::Error::new(std::io::ErrorKind::Other, "is a directory"),
            }),
            None => Err(FsError::NotFound { path: key }),
        }
    }

    fn host_path(&self, path: &str) -> PathBuf {
        let mut host = self.host_root.clone();
        for component in path::components(&path::normalize(path)) {
            host.push(component);
        }
        host
    }
}

fn to_entry(key: &str, node: &Node) -> DirectoryEntry {
    DirectoryEntry {
        name: path::leaf(key),
        is_dir: node.is_dir,
        modified_at: node.modified_at,
        size: node.contents.len() as u64,
    }
}
