//! Local disk provider

use crate::entry::DirectoryEntry;
use crate::fs::{FileSystem, FsError};
use crate::path;
use std::path::{Path, PathBuf};

/// Filesystem provider backed by a directory on the local disk
///
/// Virtual paths resolve below `root`; `..` components are dropped so a
/// request can never escape the served tree.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Serve `root`, made absolute against the current directory if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FsError> {
        let root = root.as_ref();
        let display = root.display().to_string();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| FsError::from_io(&display, e))?
                .join(root)
        };

        let metadata = std::fs::metadata(&root).map_err(|e| FsError::from_io(&display, e))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory { path: display });
        }

        Ok(Self { root })
    }

    /// Served root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, virtual_path: &str) -> PathBuf {
        let mut resolved = self.root.clone();
        for component in path::components(&path::normalize(virtual_path)) {
            resolved.push(component);
        }
        resolved
    }
}

impl FileSystem for LocalFileSystem {
    fn list(&self, dir: &str) -> Result<Vec<DirectoryEntry>, FsError> {
        let host = self.resolve(dir);
        let read_dir = std::fs::read_dir(&host).map_err(|e| FsError::from_io(dir, e))?;

        let mut entries = Vec::new();
        for item in read_dir {
            let item = item.map_err(|e| FsError::from_io(dir, e))?;
            // Entries can vanish between readdir and stat
            let metadata = match std::fs::metadata(item.path()) {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!("skipping {}: {}", item.path().display(), e);
                    continue;
                }
            };
            let name = item.file_name().to_string_lossy().into_owned();
            entries.push(DirectoryEntry::from_metadata(name, &metadata));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn lookup(&self, virtual_path: &str) -> Option<DirectoryEntry> {
        let host = self.resolve(virtual_path);
        let metadata = std::fs::metadata(&host).ok()?;
        Some(DirectoryEntry::from_metadata(path::leaf(virtual_path), &metadata))
    }

    fn read(&self, virtual_path: &str) -> Result<Vec<u8>, FsError> {
        std::fs::read(self.resolve(virtual_path)).map_err(|e| FsError::from_io(virtual_path, e))
    }

    fn host_path(&self, virtual_path: &str) -> PathBuf {
        self.resolve(virtual_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_list_and_lookup() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("b.txt"), b"hello").unwrap();
        fs::write(temp_dir.path().join("sub/inner"), b"x").unwrap();

        let local = LocalFileSystem::new(temp_dir.path()).unwrap();

        let entries = local.list("/").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "sub"]);
        assert!(entries[1].is_dir);
        assert_eq!(entries[0].size, 5);

        let inner = local.lookup("/sub/inner").unwrap();
        assert_eq!(inner.name, "inner");
        assert!(!inner.is_dir);

        assert!(local.lookup("/missing").is_none());
        assert!(local.is_dir("/sub"));
        assert!(!local.is_dir("/b.txt"));
        assert!(local.exists("/b.txt"));
    }

    #[test]
    fn test_list_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalFileSystem::new(temp_dir.path()).unwrap();

        match local.list("/nope") {
            Err(FsError::NotFound { path }) => assert_eq!(path, "/nope"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_host_path_stays_below_root() {
        let temp_dir = TempDir::new().unwrap();
        let local = LocalFileSystem::new(temp_dir.path()).unwrap();

        assert_eq!(local.host_path("/a/b"), temp_dir.path().join("a/b"));
        assert_eq!(local.host_path("/../etc"), temp_dir.path().join("etc"));
        assert_eq!(local.host_path("/"), temp_dir.path());
    }

    #[test]
    fn test_read() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("f"), b"contents").unwrap();
        let local = LocalFileSystem::new(temp_dir.path()).unwrap();

        assert_eq!(local.read("/f").unwrap(), b"contents");
        assert!(local.read("/g").is_err());
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("f");
        fs::write(&file, b"").unwrap();

        assert!(matches!(
            LocalFileSystem::new(&file),
            Err(FsError::NotADirectory { .. })
        ));
    }
}
