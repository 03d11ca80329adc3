//! Local file system backed by OS file APIs.

use crate::error::{StorageError, StorageResult};
use crate::filesystem::{FileStatus, FileSystem, FileWriter};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const IN_PROGRESS_SUFFIX: &str = ".inprogress";

/// A file system over the local OS file hierarchy.
///
/// New files are written to a hidden in-progress file next to their target
/// and renamed into place on commit, so readers never observe a partially
/// written file.
///
/// # Thread Safety
///
/// This type holds no state and can be shared freely across threads.
///
/// # Example
///
/// ```no_run
/// use quarry_storage::{FileSystem, LocalFileSystem};
/// use std::path::Path;
///
/// let fs = LocalFileSystem::new();
/// fs.mkdirs(Path::new("/tmp/quarry/data")).unwrap();
/// fs.write_all(Path::new("/tmp/quarry/data/part"), b"bytes", true).unwrap();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    /// Creates a handle to the local file system.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn map_io(path: &Path, err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound {
            path: path.to_path_buf(),
        },
        io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
            path: path.to_path_buf(),
        },
        _ => StorageError::Io(err),
    }
}

fn is_in_progress(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(IN_PROGRESS_SUFFIX)
}

fn file_name(path: &Path) -> StorageResult<&str> {
    path.file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::InvalidPath(path.display().to_string()))
}

struct LocalFileWriter {
    target: PathBuf,
    temp: PathBuf,
    file: Option<BufWriter<File>>,
    overwrite: bool,
}

impl Write for LocalFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.as_mut() {
            Some(file) => file.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "writer already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl FileWriter for LocalFileWriter {
    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        let Some(writer) = self.file.take() else {
            return Ok(());
        };
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        if !self.overwrite && self.target.exists() {
            return Err(StorageError::AlreadyExists {
                path: self.target.clone(),
            });
        }
        fs::rename(&self.temp, &self.target).map_err(|e| map_io(&self.target, e))
    }
}

impl Drop for LocalFileWriter {
    fn drop(&mut self) {
        // No-op after a successful commit: the temp file has been renamed.
        let _ = fs::remove_file(&self.temp);
    }
}

impl FileSystem for LocalFileSystem {
    fn uri(&self) -> &str {
        "file://"
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        Ok(path.exists())
    }

    fn status(&self, path: &Path) -> StorageResult<FileStatus> {
        let meta = fs::metadata(path).map_err(|e| map_io(path, e))?;
        Ok(FileStatus {
            path: path.to_path_buf(),
            is_dir: meta.is_dir(),
            len: if meta.is_dir() { 0 } else { meta.len() },
        })
    }

    fn list(&self, path: &Path) -> StorageResult<Vec<FileStatus>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| map_io(path, e))? {
            let entry = entry?;
            if entry.file_name().to_str().is_some_and(is_in_progress) {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                // Removed between read_dir and metadata.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            entries.push(FileStatus {
                path: entry.path(),
                is_dir: meta.is_dir(),
                len: if meta.is_dir() { 0 } else { meta.len() },
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn mkdirs(&self, path: &Path) -> StorageResult<()> {
        fs::create_dir_all(path).map_err(|e| map_io(path, e))
    }

    fn create(&self, path: &Path, overwrite: bool) -> StorageResult<Box<dyn FileWriter>> {
        let name = file_name(path)?;
        if !overwrite && path.exists() {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        fs::create_dir_all(parent).map_err(|e| map_io(parent, e))?;

        let temp = parent.join(format!(
            ".{name}.{}{IN_PROGRESS_SUFFIX}",
            uuid::Uuid::new_v4().simple()
        ));
        let file = File::create(&temp).map_err(|e| map_io(&temp, e))?;
        Ok(Box::new(LocalFileWriter {
            target: path.to_path_buf(),
            temp,
            file: Some(BufWriter::new(file)),
            overwrite,
        }))
    }

    fn open(&self, path: &Path) -> StorageResult<Box<dyn Read + Send>> {
        let file = File::open(path).map_err(|e| map_io(path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn delete(&self, path: &Path, recursive: bool) -> StorageResult<bool> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            fs::remove_file(path).map_err(|e| map_io(path, e))?;
        } else if recursive {
            fs::remove_dir_all(path).map_err(|e| map_io(path, e))?;
        } else {
            if fs::read_dir(path)?.next().is_some() {
                return Err(StorageError::DirectoryNotEmpty {
                    path: path.to_path_buf(),
                });
            }
            fs::remove_dir(path).map_err(|e| map_io(path, e))?;
        }
        Ok(true)
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        if !from.exists() {
            return Err(StorageError::NotFound {
                path: from.to_path_buf(),
            });
        }
        if to.exists() {
            return Err(StorageError::AlreadyExists {
                path: to.to_path_buf(),
            });
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io(parent, e))?;
        }
        fs::rename(from, to).map_err(|e| map_io(from, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn local_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b.bin");
        let fs = LocalFileSystem::new();

        fs.write_all(&path, b"hello world", false).unwrap();

        assert!(fs.exists(&path).unwrap());
        assert_eq!(fs.read_all(&path).unwrap(), b"hello world");
        assert_eq!(fs.status(&path).unwrap().len, 11);
    }

    #[test]
    fn local_uncommitted_file_is_invisible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pending.bin");
        let fs = LocalFileSystem::new();

        let mut writer = fs.create(&path, false).unwrap();
        writer.write_all(b"partial").unwrap();
        assert!(!fs.exists(&path).unwrap());
        assert!(fs.list(dir.path()).unwrap().is_empty());

        drop(writer);
        assert!(!fs.exists(&path).unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn local_create_without_overwrite_fails_on_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x");
        let fs = LocalFileSystem::new();

        fs.write_all(&path, b"1", false).unwrap();
        let result = fs.create(&path, false);
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));

        fs.write_all(&path, b"2", true).unwrap();
        assert_eq!(fs.read_all(&path).unwrap(), b"2");
    }

    #[test]
    fn local_list_is_sorted() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        fs.write_all(&dir.path().join("c"), b"", false).unwrap();
        fs.write_all(&dir.path().join("a"), b"", false).unwrap();
        fs.mkdirs(&dir.path().join("b")).unwrap();

        let names: Vec<_> = fs
            .list(dir.path())
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn local_rename_refuses_existing_target() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let a = dir.path().join("a");
        let b = dir.path().join("sub").join("b");
        fs.write_all(&a, b"a", false).unwrap();

        fs.rename(&a, &b).unwrap();
        assert!(!fs.exists(&a).unwrap());
        assert_eq!(fs.read_all(&b).unwrap(), b"a");

        fs.write_all(&a, b"again", false).unwrap();
        let result = fs.rename(&a, &b);
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn local_delete_non_recursive_on_full_dir_fails() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let sub = dir.path().join("sub");
        fs.write_all(&sub.join("f"), b"", false).unwrap();

        let result = fs.delete(&sub, false);
        assert!(matches!(result, Err(StorageError::DirectoryNotEmpty { .. })));
        assert!(fs.delete(&sub, true).unwrap());
        assert!(!fs.delete(&sub, true).unwrap());
    }

    #[test]
    fn local_missing_path_is_not_found() {
        let dir = tempdir().unwrap();
        let fs = LocalFileSystem::new();
        let err = fs.status(&dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
    }
}
