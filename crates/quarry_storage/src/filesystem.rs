//! File system trait definition.

use crate::error::StorageResult;
use std::fmt::Debug;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Status of a single file system entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// Full path of the entry.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Length in bytes (0 for directories).
    pub len: u64,
}

impl FileStatus {
    /// Returns the final path component, or an empty string for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// A writer for a file that becomes visible only once committed.
///
/// Dropping a writer without calling [`FileWriter::commit`] discards
/// everything written to it; no partial file is ever observable.
pub trait FileWriter: Write + Send {
    /// Flushes the written bytes and publishes the file at its target path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be published, for example because
    /// another writer created the same path and overwriting was not requested.
    fn commit(self: Box<Self>) -> StorageResult<()>;
}

/// A hierarchical file system.
///
/// File systems hold directories and opaque byte files. Stores layer their
/// descriptors, record formats and partition structures on top of this trait;
/// implementations never interpret file contents.
///
/// # Invariants
///
/// - `create` is atomic: readers see either no file or the complete file
/// - `rename` is atomic and never replaces an existing target
/// - `list` returns immediate children sorted by name
/// - Implementations must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::MemoryFileSystem`] - For testing
/// - [`super::LocalFileSystem`] - For persistent storage
pub trait FileSystem: Send + Sync + Debug {
    /// Returns the URI identifying this file system's namespace.
    ///
    /// Two handles reporting the same URI address the same files, so a
    /// rename between them is possible.
    fn uri(&self) -> &str;

    /// Returns true if an entry exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if existence cannot be determined.
    fn exists(&self, path: &Path) -> StorageResult<bool>;

    /// Returns the status of the entry at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if there is no such entry.
    fn status(&self, path: &Path) -> StorageResult<FileStatus>;

    /// Lists the immediate children of the directory at `path`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or is not a directory.
    fn list(&self, path: &Path) -> StorageResult<Vec<FileStatus>>;

    /// Creates the directory at `path` along with all missing ancestors.
    ///
    /// Succeeds if the directory already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a file occupies `path` or one of its ancestors.
    fn mkdirs(&self, path: &Path) -> StorageResult<()>;

    /// Opens a writer for a new file at `path`.
    ///
    /// Missing parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::AlreadyExists`] if a file exists at
    /// `path` and `overwrite` is false.
    fn create(&self, path: &Path, overwrite: bool) -> StorageResult<Box<dyn FileWriter>>;

    /// Opens the file at `path` for sequential reading.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no file at `path`.
    fn open(&self, path: &Path) -> StorageResult<Box<dyn Read + Send>>;

    /// Deletes the entry at `path`.
    ///
    /// Returns false if nothing existed at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::DirectoryNotEmpty`] when deleting a
    /// non-empty directory with `recursive` unset.
    fn delete(&self, path: &Path, recursive: bool) -> StorageResult<bool>;

    /// Atomically renames `from` to `to`, creating `to`'s parent if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` does not exist or `to` already exists.
    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn read_all(&self, path: &Path) -> StorageResult<Vec<u8>> {
        let mut reader = self.open(path)?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Creates the file at `path` with `data` as its complete contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or committed.
    fn write_all(&self, path: &Path, data: &[u8], overwrite: bool) -> StorageResult<()> {
        let mut writer = self.create(path, overwrite)?;
        writer.write_all(data)?;
        writer.commit()
    }
}
