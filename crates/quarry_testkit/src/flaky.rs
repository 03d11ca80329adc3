//! A file system with eventually consistent listings.
//!
//! Remote object stores may list a file before a status lookup can see it.
//! [`FlakyListingFileSystem`] reproduces that by listing *ghost* entries that
//! the wrapped file system does not hold.

use parking_lot::RwLock;
use quarry_storage::{FileStatus, FileSystem, FileWriter, StorageResult};
use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Wraps a file system and adds ghost entries to its listings.
///
/// Ghosts show up in [`FileSystem::list`] of their parent directory as
/// empty files, while `exists` and `status` keep answering from the wrapped
/// file system. A ghost stops being reported once the wrapped file system
/// holds a real entry at its path.
#[derive(Debug, Clone)]
pub struct FlakyListingFileSystem {
    inner: Arc<dyn FileSystem>,
    ghosts: Arc<RwLock<BTreeSet<PathBuf>>>,
}

impl FlakyListingFileSystem {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn FileSystem>) -> Self {
        Self {
            inner,
            ghosts: Arc::new(RwLock::new(BTreeSet::new())),
        }
    }

    /// Lists `path` without a backing entry.
    pub fn add_ghost(&self, path: impl Into<PathBuf>) {
        self.ghosts.write().insert(path.into());
    }

    /// Returns the ghosts the wrapped file system still lacks.
    pub fn pending_ghosts(&self) -> Vec<PathBuf> {
        self.ghosts
            .read()
            .iter()
            .filter(|p| !matches!(self.inner.exists(p), Ok(true)))
            .cloned()
            .collect()
    }
}

impl FileSystem for FlakyListingFileSystem {
    fn uri(&self) -> &str {
        self.inner.uri()
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        self.inner.exists(path)
    }

    fn status(&self, path: &Path) -> StorageResult<FileStatus> {
        self.inner.status(path)
    }

    fn list(&self, path: &Path) -> StorageResult<Vec<FileStatus>> {
        let mut entries = self.inner.list(path)?;
        for ghost in self.ghosts.read().iter() {
            if ghost.parent() != Some(path) || entries.iter().any(|e| &e.path == ghost) {
                continue;
            }
            entries.push(FileStatus {
                path: ghost.clone(),
                is_dir: false,
                len: 0,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn mkdirs(&self, path: &Path) -> StorageResult<()> {
        self.inner.mkdirs(path)
    }

    fn create(&self, path: &Path, overwrite: bool) -> StorageResult<Box<dyn FileWriter>> {
        self.inner.create(path, overwrite)
    }

    fn open(&self, path: &Path) -> StorageResult<Box<dyn Read + Send>> {
        self.inner.open(path)
    }

    fn delete(&self, path: &Path, recursive: bool) -> StorageResult<bool> {
        self.ghosts.write().remove(path);
        self.inner.delete(path, recursive)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        self.inner.rename(from, to)
    }
}
