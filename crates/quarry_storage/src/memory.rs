//! In-memory file system for testing.

use crate::error::{StorageError, StorageResult};
use crate::filesystem::{FileStatus, FileSystem, FileWriter};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::ops::Bound;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

type Nodes = BTreeMap<PathBuf, Node>;

/// An in-memory file system.
///
/// All entries live in a single sorted map keyed by absolute path. Relative
/// paths are resolved against `/`. Clones share the same namespace and URI,
/// so a clone behaves like a second client of the same remote file system.
///
/// This file system is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This file system is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use quarry_storage::{FileSystem, MemoryFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// fs.mkdirs(Path::new("/a/b")).unwrap();
/// assert!(fs.exists(Path::new("/a")).unwrap());
/// assert_eq!(fs.list(Path::new("/a")).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFileSystem {
    uri: String,
    nodes: Arc<RwLock<Nodes>>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        let mut nodes = Nodes::new();
        nodes.insert(PathBuf::from("/"), Node::Dir);
        Self {
            uri: format!("mem://{}", uuid::Uuid::new_v4().simple()),
            nodes: Arc::new(RwLock::new(nodes)),
        }
    }
}

impl MemoryFileSystem {
    /// Creates a new, empty file system with a unique URI.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the paths of every file, in sorted order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn files(&self) -> Vec<PathBuf> {
        self.nodes
            .read()
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }
}

fn normalize(path: &Path) -> StorageResult<PathBuf> {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(name) => out.push(name),
            Component::ParentDir | Component::Prefix(_) => {
                return Err(StorageError::InvalidPath(path.display().to_string()));
            }
        }
    }
    Ok(out)
}

fn status_of(path: &Path, node: &Node) -> FileStatus {
    FileStatus {
        path: path.to_path_buf(),
        is_dir: matches!(node, Node::Dir),
        len: match node {
            Node::Dir => 0,
            Node::File(data) => data.len() as u64,
        },
    }
}

fn descendants(nodes: &Nodes, dir: &Path) -> Vec<PathBuf> {
    nodes
        .range::<Path, _>((Bound::Excluded(dir), Bound::Unbounded))
        .take_while(|(path, _)| path.starts_with(dir))
        .map(|(path, _)| path.clone())
        .collect()
}

fn ensure_dirs(nodes: &mut Nodes, dir: &Path) -> StorageResult<()> {
    let mut current = PathBuf::new();
    for component in dir.components() {
        current.push(component);
        match nodes.get(&current) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(StorageError::NotADirectory { path: current });
            }
            None => {
                nodes.insert(current.clone(), Node::Dir);
            }
        }
    }
    Ok(())
}

struct MemoryFileWriter {
    nodes: Arc<RwLock<Nodes>>,
    path: PathBuf,
    buf: Vec<u8>,
    overwrite: bool,
}

impl Write for MemoryFileWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileWriter for MemoryFileWriter {
    fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self {
            nodes,
            path,
            buf,
            overwrite,
        } = *self;
        let mut nodes = nodes.write();
        match nodes.get(&path) {
            Some(Node::Dir) => return Err(StorageError::AlreadyExists { path }),
            Some(Node::File(_)) if !overwrite => return Err(StorageError::AlreadyExists { path }),
            _ => {}
        }
        if let Some(parent) = path.parent() {
            ensure_dirs(&mut nodes, parent)?;
        }
        nodes.insert(path, Node::File(buf));
        Ok(())
    }
}

impl FileSystem for MemoryFileSystem {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn exists(&self, path: &Path) -> StorageResult<bool> {
        let path = normalize(path)?;
        Ok(self.nodes.read().contains_key(&path))
    }

    fn status(&self, path: &Path) -> StorageResult<FileStatus> {
        let path = normalize(path)?;
        let nodes = self.nodes.read();
        match nodes.get(&path) {
            Some(node) => Ok(status_of(&path, node)),
            None => Err(StorageError::NotFound { path }),
        }
    }

    fn list(&self, path: &Path) -> StorageResult<Vec<FileStatus>> {
        let dir = normalize(path)?;
        let nodes = self.nodes.read();
        match nodes.get(&dir) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(StorageError::NotADirectory { path: dir }),
            None => return Err(StorageError::NotFound { path: dir }),
        }
        Ok(nodes
            .range::<Path, _>((Bound::Excluded(dir.as_path()), Bound::Unbounded))
            .take_while(|(child, _)| child.starts_with(&dir))
            .filter(|(child, _)| child.parent() == Some(dir.as_path()))
            .map(|(child, node)| status_of(child, node))
            .collect())
    }

    fn mkdirs(&self, path: &Path) -> StorageResult<()> {
        let path = normalize(path)?;
        ensure_dirs(&mut self.nodes.write(), &path)
    }

    fn create(&self, path: &Path, overwrite: bool) -> StorageResult<Box<dyn FileWriter>> {
        let path = normalize(path)?;
        match self.nodes.read().get(&path) {
            Some(Node::Dir) => return Err(StorageError::AlreadyExists { path }),
            Some(Node::File(_)) if !overwrite => return Err(StorageError::AlreadyExists { path }),
            _ => {}
        }
        Ok(Box::new(MemoryFileWriter {
            nodes: Arc::clone(&self.nodes),
            path,
            buf: Vec::new(),
            overwrite,
        }))
    }

    fn open(&self, path: &Path) -> StorageResult<Box<dyn Read + Send>> {
        let path = normalize(path)?;
        match self.nodes.read().get(&path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir) => Err(StorageError::InvalidPath(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(StorageError::NotFound { path }),
        }
    }

    fn delete(&self, path: &Path, recursive: bool) -> StorageResult<bool> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.write();
        let is_dir = nodes.get(&path).map(|node| matches!(node, Node::Dir));
        match is_dir {
            None => Ok(false),
            Some(false) => {
                nodes.remove(&path);
                Ok(true)
            }
            Some(true) => {
                let children = descendants(&nodes, &path);
                if !children.is_empty() && !recursive {
                    return Err(StorageError::DirectoryNotEmpty { path });
                }
                for child in children {
                    nodes.remove(&child);
                }
                if path.parent().is_some() {
                    nodes.remove(&path);
                }
                Ok(true)
            }
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        let mut nodes = self.nodes.write();
        let Some(node) = nodes.get(&from).cloned() else {
            return Err(StorageError::NotFound { path: from });
        };
        if nodes.contains_key(&to) {
            return Err(StorageError::AlreadyExists { path: to });
        }
        if to.starts_with(&from) {
            return Err(StorageError::InvalidPath(format!(
                "cannot move {} into itself",
                from.display()
            )));
        }
        if let Some(parent) = to.parent() {
            ensure_dirs(&mut nodes, parent)?;
        }

        let moved = descendants(&nodes, &from);
        for child in moved {
            if let (Some(child_node), Ok(rel)) = (nodes.remove(&child), child.strip_prefix(&from)) {
                nodes.insert(to.join(rel), child_node);
            }
        }
        nodes.remove(&from);
        nodes.insert(to, node);
        Ok(())
    }
}
