//! The partitioned record store.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::iter::Records;
use crate::paths::{self, EXTENSION, META_EXTENSION};
use crate::session::WriteSession;
use crate::spec::{StoreSpec, DESCRIPTOR_NAME};
use crate::structure::{Structure, StructureRegistry};
use quarry_format::RecordFormat;
use quarry_storage::{FileStatus, FileSystem};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A partitioned record store rooted at a file system path.
///
/// A store is governed by one descriptor ([`StoreSpec`]) at its physical
/// root. A `Store` value may also be a *view* of a directory below that
/// root (see [`Store::sub_store`]); views share the descriptor, structure
/// and format of their physical owner and see only the files below their
/// instance root.
///
/// # Layout
///
/// ```text
/// root/
/// ├── quarry.spec          descriptor
/// ├── a/
/// │   ├── part-0.qrec      stored file "a/part-0"
/// │   └── part-0.qmeta     metadata "a/part-0"
/// └── _scratch/            reserved, never listed
/// ```
///
/// # Example
///
/// ```rust
/// use quarry_core::{Store, StoreSpec};
/// use quarry_storage::MemoryFileSystem;
/// use std::sync::Arc;
///
/// let fs = Arc::new(MemoryFileSystem::new());
/// let store = Store::create(fs, "/events", &StoreSpec::default(), true)?;
///
/// let mut session = store.open_write("day-1", false)?;
/// session.write(b"first")?;
/// session.write(b"second")?;
/// session.close()?;
///
/// let records: Vec<Vec<u8>> = store.iter()?.collect::<Result<_, _>>()?;
/// assert_eq!(records, vec![b"first".to_vec(), b"second".to_vec()]);
/// # Ok::<(), quarry_core::CoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Store {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    instance_root: PathBuf,
    spec: StoreSpec,
    structure: Arc<dyn Structure>,
    format: Arc<dyn RecordFormat>,
    config: Config,
}

impl Store {
    /// Creates a store at `path`, or a view into the store that already
    /// owns `path`.
    ///
    /// When an ancestor of `path` already holds a descriptor, `spec` must
    /// match it: the full spec when `spec` names a format, only the structure
    /// when it names just a structure. A spec naming neither accepts any
    /// existing descriptor. No second descriptor is written in that case.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if `fail_on_exists` is set and a store
    ///   or any entry already exists at `path`, or if `spec` does not match
    ///   the existing descriptor
    /// - [`CoreError::Configuration`] if `path` has several descriptors
    ///   on its ancestor chain, or its structure is not registered
    pub fn create(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        spec: &StoreSpec,
        fail_on_exists: bool,
    ) -> CoreResult<Self> {
        Self::create_with(fs, path, spec, fail_on_exists, Config::default())
    }

    /// Creates a store with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`Store::create`].
    pub fn create_with(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        spec: &StoreSpec,
        fail_on_exists: bool,
        config: Config,
    ) -> CoreResult<Self> {
        Self::create_inner(fs, path.as_ref(), spec, fail_on_exists, config, None)
    }

    pub(crate) fn create_inner(
        fs: Arc<dyn FileSystem>,
        path: &Path,
        spec: &StoreSpec,
        fail_on_exists: bool,
        config: Config,
        structure: Option<Arc<dyn Structure>>,
    ) -> CoreResult<Self> {
        let format = spec.instantiate_format()?;
        let requested = spec.normalized(format.as_ref());
        let existing = find_descriptor(fs.as_ref(), path)?;

        if fail_on_exists {
            if let Some((root, _)) = &existing {
                return Err(CoreError::invalid_argument(format!(
                    "store already exists at {} (owned by {})",
                    path.display(),
                    root.display()
                )));
            }
            if fs.exists(path)? {
                return Err(CoreError::invalid_argument(format!(
                    "{} already exists",
                    path.display()
                )));
            }
        }

        if let Some((root, found)) = &existing {
            let compatible = match (&spec.format, &spec.structure) {
                (Some(_), _) => requested == *found,
                (None, Some(_)) => requested.structure_identity() == found.structure_identity(),
                (None, None) => true,
            };
            if !compatible {
                return Err(CoreError::invalid_argument(format!(
                    "spec {requested:?} does not match store at {}: {found:?}",
                    root.display()
                )));
            }
        }

        fs.mkdirs(path)?;
        let (root, spec) = match existing {
            Some(found) => found,
            None => {
                requested.write_to(fs.as_ref(), path)?;
                info!(
                    path = %path.display(),
                    format = requested.format_name(),
                    structure = requested.structure_identity(),
                    "created store"
                );
                (path.to_path_buf(), requested)
            }
        };
        Self::assemble(fs, root, path.to_path_buf(), spec, config, structure)
    }

    /// Opens the store that owns `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if `path` does not exist or no descriptor
    ///   governs it
    /// - [`CoreError::Configuration`] if several descriptors govern it
    pub fn open(fs: Arc<dyn FileSystem>, path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with(fs, path, Config::default())
    }

    /// Opens a store with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`Store::open`].
    pub fn open_with(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        config: Config,
    ) -> CoreResult<Self> {
        Self::open_inner(fs, path.as_ref(), config, None)
    }

    pub(crate) fn open_inner(
        fs: Arc<dyn FileSystem>,
        path: &Path,
        config: Config,
        structure: Option<Arc<dyn Structure>>,
    ) -> CoreResult<Self> {
        if !fs.exists(path)? {
            return Err(CoreError::not_found(format!(
                "no store at {}",
                path.display()
            )));
        }
        let (root, spec) = find_descriptor(fs.as_ref(), path)?.ok_or_else(|| {
            CoreError::not_found(format!("no store descriptor governs {}", path.display()))
        })?;
        Self::assemble(fs, root, path.to_path_buf(), spec, config, structure)
    }

    fn assemble(
        fs: Arc<dyn FileSystem>,
        root: PathBuf,
        instance_root: PathBuf,
        spec: StoreSpec,
        config: Config,
        structure: Option<Arc<dyn Structure>>,
    ) -> CoreResult<Self> {
        let structure = match structure {
            Some(structure) if structure.identity() == spec.structure_identity() => structure,
            Some(structure) => {
                return Err(CoreError::invalid_argument(format!(
                    "store at {} uses structure '{}', not '{}'",
                    root.display(),
                    spec.structure_identity(),
                    structure.identity()
                )));
            }
            None => StructureRegistry::global().resolve(spec.structure_identity())?,
        };
        let format = spec.instantiate_format()?;
        Ok(Self {
            fs,
            root,
            instance_root,
            spec,
            structure,
            format,
            config,
        })
    }

    /// Returns the file system holding the store.
    #[must_use]
    pub fn fs(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Returns the physical root: the directory holding the descriptor.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory this handle is rooted at.
    #[must_use]
    pub fn instance_root(&self) -> &Path {
        &self.instance_root
    }

    /// Returns true if this handle is rooted at the physical root.
    #[must_use]
    pub fn at_root(&self) -> bool {
        self.root == self.instance_root
    }

    /// Returns the path components between the physical root and this
    /// handle's instance root.
    #[must_use]
    pub fn attrs(&self) -> Vec<String> {
        self.instance_root
            .strip_prefix(&self.root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the persisted spec.
    #[must_use]
    pub fn spec(&self) -> &StoreSpec {
        &self.spec
    }

    /// Returns the partition structure.
    #[must_use]
    pub fn structure(&self) -> &Arc<dyn Structure> {
        &self.structure
    }

    /// Returns the record format.
    #[must_use]
    pub fn format(&self) -> &Arc<dyn RecordFormat> {
        &self.format
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Names and validation
    // ---------------------------------------------------------------------

    /// Returns the physical path of the stored file `name`.
    #[must_use]
    pub fn to_stored_path(&self, name: &str) -> PathBuf {
        paths::with_extension(&self.instance_root, name, EXTENSION)
    }

    /// Returns the physical path of the metadata side-car `name`.
    #[must_use]
    pub fn to_metadata_path(&self, name: &str) -> PathBuf {
        paths::with_extension(&self.instance_root, name, META_EXTENSION)
    }

    /// Returns `name`'s components measured from the physical root.
    pub(crate) fn components_from_root(&self, name: &str) -> Vec<String> {
        let mut parts = self.attrs();
        parts.extend(paths::components(name).into_iter().map(str::to_string));
        parts
    }

    /// Checks that the directory holding `name` is a valid target of the
    /// structure.
    pub(crate) fn check_valid_structure(&self, name: &str) -> CoreResult<()> {
        let mut dirs = self.components_from_root(name);
        dirs.pop();
        let start = dirs
            .iter()
            .position(|c| !paths::is_reserved(c))
            .unwrap_or(dirs.len());
        self.check_valid_target(&dirs[start..], name)
    }

    pub(crate) fn check_valid_target(&self, dirs: &[String], name: &str) -> CoreResult<()> {
        let refs: Vec<&str> = dirs.iter().map(String::as_str).collect();
        if self.structure.is_valid_target(&refs) {
            Ok(())
        } else {
            Err(CoreError::invalid_argument(format!(
                "'{name}' is not a valid target of structure '{}' (directories {refs:?})",
                self.structure.identity()
            )))
        }
    }

    // ---------------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------------

    /// Opens a raw write session for the stored file `name`.
    ///
    /// Nothing is created until the first record is written; the file
    /// becomes visible when the session is closed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `name` is reserved or its
    /// directory is not a valid target of the structure.
    pub fn open_write(&self, name: &str, overwrite: bool) -> CoreResult<WriteSession> {
        paths::check_name(name)?;
        self.check_valid_structure(name)?;
        Ok(WriteSession::new(self.clone(), name.to_string(), overwrite))
    }

    /// Opens a sequential reader over the stored file `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for invalid names and
    /// [`CoreError::NotFound`] if the file does not exist.
    pub fn open_read(&self, name: &str) -> CoreResult<Records> {
        paths::check_name(name)?;
        self.check_valid_structure(name)?;
        let path = self.to_stored_path(name);
        if !self.fs.exists(&path)? {
            return Err(CoreError::not_found(format!("no stored file '{name}'")));
        }
        Ok(Records::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.format),
            vec![path],
        ))
    }

    /// Returns a fresh sequence over every record in the store, file by
    /// file in listing order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn iter(&self) -> CoreResult<Records> {
        Ok(Records::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.format),
            self.stored_files()?,
        ))
    }

    /// Returns true if iterating the store would yield no record.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or reading fails.
    pub fn is_empty(&self) -> CoreResult<bool> {
        match self.iter()?.next() {
            None => Ok(true),
            Some(Ok(_)) => Ok(false),
            Some(Err(e)) => Err(e),
        }
    }

    // ---------------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------------

    fn walk(&self, dir: &Path, out: &mut Vec<FileStatus>) -> CoreResult<()> {
        for entry in self.fs.list(dir)? {
            if entry.is_dir {
                if !paths::is_reserved(entry.name()) {
                    self.walk(&entry.path, out)?;
                }
            } else {
                out.push(entry);
            }
        }
        Ok(())
    }

    pub(crate) fn list_recursive(&self, dir: &Path) -> CoreResult<Vec<FileStatus>> {
        let mut out = Vec::new();
        if self.fs.exists(dir)? {
            self.walk(dir, &mut out)?;
        }
        Ok(out)
    }

    /// Returns the physical paths of every stored file, in listing order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn stored_files(&self) -> CoreResult<Vec<PathBuf>> {
        Ok(self
            .list_recursive(&self.instance_root)?
            .into_iter()
            .filter(|f| f.name().ends_with(EXTENSION))
            .map(|f| f.path)
            .collect())
    }

    /// Returns the physical paths of every stored file and metadata file.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn stored_files_and_metadata(&self) -> CoreResult<Vec<PathBuf>> {
        Ok(self
            .list_recursive(&self.instance_root)?
            .into_iter()
            .filter(|f| f.name().ends_with(EXTENSION) || f.name().ends_with(META_EXTENSION))
            .map(|f| f.path)
            .collect())
    }

    /// Returns the logical names of every stored file.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn user_file_names(&self) -> CoreResult<Vec<String>> {
        Ok(self
            .stored_files()?
            .iter()
            .filter_map(|p| paths::logical_name(&self.instance_root, p, EXTENSION))
            .collect())
    }

    /// Returns the logical names of every metadata file.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn metadata_file_names(&self) -> CoreResult<Vec<String>> {
        Ok(self
            .list_recursive(&self.instance_root)?
            .iter()
            .filter_map(|f| paths::logical_name(&self.instance_root, &f.path, META_EXTENSION))
            .collect())
    }

    /// Returns the names of the metadata files directly inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` exists but cannot be listed.
    pub fn metadata_file_names_at(&self, dir: &str) -> CoreResult<Vec<String>> {
        let path = self.dir_path(dir);
        if !self.fs.exists(&path)? {
            return Ok(Vec::new());
        }
        Ok(self
            .fs
            .list(&path)?
            .iter()
            .filter(|f| !f.is_dir)
            .filter_map(|f| f.name().strip_suffix(META_EXTENSION).map(str::to_string))
            .filter(|name| !name.is_empty())
            .collect())
    }

    /// Returns the attributes at `dir`: the names of its child directories,
    /// reserved ones excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` exists but cannot be listed.
    pub fn attrs_at(&self, dir: &str) -> CoreResult<Vec<String>> {
        let path = self.dir_path(dir);
        if !self.fs.exists(&path)? {
            return Ok(Vec::new());
        }
        Ok(self
            .fs
            .list(&path)?
            .iter()
            .filter(|f| f.is_dir && !paths::is_reserved(f.name()))
            .map(|f| f.name().to_string())
            .collect())
    }

    pub(crate) fn dir_path(&self, dir: &str) -> PathBuf {
        let mut path = self.instance_root.clone();
        for part in paths::components(dir) {
            path.push(part);
        }
        path
    }

    // ---------------------------------------------------------------------
    // Views, attributes and metadata
    // ---------------------------------------------------------------------

    /// Returns a view rooted at `relative`, creating the directory if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for reserved names.
    pub fn sub_store(&self, relative: &str) -> CoreResult<Store> {
        paths::check_name(relative)?;
        let instance_root = self.dir_path(relative);
        self.fs.mkdirs(&instance_root)?;
        Ok(Self {
            instance_root,
            ..self.clone()
        })
    }

    /// Creates the attribute directory `relative`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for reserved names.
    pub fn mk_attr(&self, relative: &str) -> CoreResult<()> {
        paths::check_name(relative)?;
        self.fs.mkdirs(&self.dir_path(relative))?;
        Ok(())
    }

    /// Reads the metadata side-car `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if the side-car is not UTF-8.
    pub fn metadata(&self, name: &str) -> CoreResult<Option<String>> {
        paths::check_name(name)?;
        let path = self.to_metadata_path(name);
        if !self.fs.exists(&path)? {
            return Ok(None);
        }
        let bytes = self.fs.read_all(&path)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| CoreError::serialization(format!("metadata '{name}' is not UTF-8: {e}")))
    }

    /// Writes the metadata side-car `name`, replacing any previous value.
    ///
    /// Metadata is not checked against the structure.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for reserved names.
    pub fn write_metadata(&self, name: &str, value: &str) -> CoreResult<()> {
        paths::check_name(name)?;
        self.fs
            .write_all(&self.to_metadata_path(name), value.as_bytes(), true)?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Deletion
    // ---------------------------------------------------------------------

    /// Deletes the stored file `name`. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for reserved names.
    pub fn delete(&self, name: &str) -> CoreResult<bool> {
        paths::check_name(name)?;
        Ok(self.fs.delete(&self.to_stored_path(name), false)?)
    }

    /// Deletes every stored file. Directories and metadata stay.
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    pub fn clear(&self) -> CoreResult<usize> {
        let files = self.stored_files()?;
        for file in &files {
            self.fs.delete(file, false)?;
        }
        info!(store = %self.instance_root.display(), files = files.len(), "cleared store");
        Ok(files.len())
    }

    // ---------------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------------

    /// Creates an empty store with this store's spec at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `path` exists or lies inside
    /// another store.
    pub fn create_empty_mimic(&self, fs: Arc<dyn FileSystem>, path: impl AsRef<Path>) -> CoreResult<Store> {
        let path = path.as_ref();
        if let Some((root, _)) = find_descriptor(fs.as_ref(), path)? {
            return Err(CoreError::invalid_argument(format!(
                "{} lies inside the store at {}",
                path.display(),
                root.display()
            )));
        }
        if fs.exists(path)? {
            return Err(CoreError::invalid_argument(format!(
                "{} already exists",
                path.display()
            )));
        }
        Self::create_inner(
            fs,
            path,
            &self.spec,
            true,
            self.config.clone(),
            Some(Arc::clone(&self.structure)),
        )
    }

    /// Copies the current contents into a new store at `path`, names kept.
    ///
    /// # Errors
    ///
    /// Fails like [`Store::create_empty_mimic`] and [`Store::copy_append`].
    pub fn snapshot(&self, path: impl AsRef<Path>) -> CoreResult<Store> {
        let snapshot = self.create_empty_mimic(Arc::clone(&self.fs), path)?;
        snapshot.copy_append(
            self,
            &crate::CopyArgs::new().rename_mode(crate::RenameMode::NoRename),
        )?;
        Ok(snapshot)
    }

    /// Deletes every stored file whose name also exists in `snapshot`,
    /// leaving only what was added after the snapshot was taken.
    ///
    /// # Errors
    ///
    /// Returns the first listing or backend error.
    pub fn delete_snapshot(&self, snapshot: &Store) -> CoreResult<usize> {
        let mut deleted = 0;
        for name in snapshot.user_file_names()? {
            if self.delete(&name)? {
                deleted += 1;
            }
        }
        debug!(store = %self.instance_root.display(), deleted, "deleted snapshot files");
        Ok(deleted)
    }

    /// Creates a store at `path` with the same structure but another record
    /// format, and copies every record into it.
    ///
    /// # Errors
    ///
    /// Fails like [`Store::create`] and [`Store::copy_append`].
    pub fn coerce(
        &self,
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        format: &str,
        args: quarry_format::FormatArgs,
    ) -> CoreResult<Store> {
        let spec = StoreSpec::new(format)
            .with_args(args)
            .with_structure(self.structure.identity());
        let dest = Self::create_inner(
            fs,
            path.as_ref(),
            &spec,
            true,
            self.config.clone(),
            Some(Arc::clone(&self.structure)),
        )?;
        dest.copy_append(
            self,
            &crate::CopyArgs::new().rename_mode(crate::RenameMode::NoRename),
        )?;
        Ok(dest)
    }

    // ---------------------------------------------------------------------
    // Consistency
    // ---------------------------------------------------------------------

    /// Re-creates, as empty files, stored files that listing reports but
    /// whose status cannot be read. Returns how many were re-created.
    ///
    /// Meant for backends with eventually consistent listings. Best effort:
    /// a file another process creates meanwhile is left alone.
    ///
    /// # Errors
    ///
    /// Returns the first backend error other than a missing file.
    pub fn repair_consistency(&self) -> CoreResult<usize> {
        let mut repaired = 0;
        for path in self.stored_files()? {
            match self.fs.status(&path) {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    match self.fs.write_all(&path, &[], false) {
                        Ok(()) => {
                            warn!(path = %path.display(), "re-created missing stored file");
                            repaired += 1;
                        }
                        Err(quarry_storage::StorageError::AlreadyExists { .. }) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        if repaired > 0 {
            info!(store = %self.instance_root.display(), repaired, "repaired store listing");
        }
        Ok(repaired)
    }

    /// Returns the leaves below this handle: directories, relative to the
    /// instance root, that are valid targets of the structure.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] if a stored file sits in a
    /// directory that is not a valid target.
    pub fn leaves(&self) -> CoreResult<Vec<String>> {
        let mut leaves = Vec::new();
        let mut queue = VecDeque::from([String::new()]);
        while let Some(dir) = queue.pop_front() {
            let from_root = self.components_from_root(&dir);
            let refs: Vec<&str> = from_root.iter().map(String::as_str).collect();
            if self.structure.is_valid_target(&refs) {
                leaves.push(dir);
                continue;
            }
            for entry in self.fs.list(&self.dir_path(&dir))? {
                if entry.is_dir {
                    if !paths::is_reserved(entry.name()) {
                        queue.push_back(paths::join(&dir, entry.name()));
                    }
                } else if entry.name().ends_with(EXTENSION) {
                    return Err(CoreError::illegal_state(format!(
                        "{} is not a directory and breaks the structure of {}",
                        entry.path.display(),
                        self.instance_root.display()
                    )));
                }
            }
        }
        Ok(leaves)
    }
}

/// Walks the ancestors of `path` for store descriptors.
///
/// Returns the owning root and its spec, or `None` if no ancestor holds a
/// descriptor.
fn find_descriptor(fs: &dyn FileSystem, path: &Path) -> CoreResult<Option<(PathBuf, StoreSpec)>> {
    let mut found: Option<PathBuf> = None;
    for dir in path.ancestors() {
        if fs.exists(&dir.join(DESCRIPTOR_NAME))? {
            if let Some(first) = &found {
                return Err(CoreError::configuration(format!(
                    "{} is governed by several descriptors ({} and {})",
                    path.display(),
                    first.display(),
                    dir.display()
                )));
            }
            found = Some(dir.to_path_buf());
        }
    }
    match found {
        Some(root) => {
            let spec = StoreSpec::read_from(fs, &root)?;
            Ok(Some((root, spec)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::collect_records;
    use quarry_storage::{LocalFileSystem, MemoryFileSystem};
    use tempfile::tempdir;

    fn mem() -> Arc<dyn FileSystem> {
        Arc::new(MemoryFileSystem::new())
    }

    fn write(store: &Store, name: &str, records: &[&str]) {
        let mut session = store.open_write(name, false).unwrap();
        for record in records {
            session.write(record.as_bytes()).unwrap();
        }
        session.close().unwrap();
    }

    fn read_all(store: &Store) -> Vec<String> {
        collect_records(store.iter().unwrap())
            .unwrap()
            .into_iter()
            .map(|r| String::from_utf8(r).unwrap())
            .collect()
    }

    #[test]
    fn create_writes_descriptor_and_open_finds_it() {
        let fs = mem();
        let store = Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        assert!(fs.exists(Path::new("/s/quarry.spec")).unwrap());
        assert!(store.at_root());

        let opened = Store::open(Arc::clone(&fs), "/s").unwrap();
        assert_eq!(opened.spec(), store.spec());
        assert_eq!(opened.structure().identity(), "default");
    }

    #[test]
    fn create_fails_on_existing_store_or_path() {
        let fs = mem();
        Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        let err = Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap_err();
        assert!(err.is_invalid_argument());

        fs.mkdirs(Path::new("/plain")).unwrap();
        let err = Store::create(Arc::clone(&fs), "/plain", &StoreSpec::default(), true).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(Store::create(fs, "/plain", &StoreSpec::default(), false).is_ok());
    }

    #[test]
    fn create_inside_store_requires_matching_spec() {
        let fs = mem();
        let spec = StoreSpec::new("framed").with_arg("checksum", true);
        Store::create(Arc::clone(&fs), "/s", &spec, true).unwrap();

        let view = Store::create(Arc::clone(&fs), "/s/a/b", &spec, false).unwrap();
        assert_eq!(view.root(), Path::new("/s"));
        assert_eq!(view.attrs(), vec!["a".to_string(), "b".to_string()]);
        assert!(!fs.exists(Path::new("/s/a/b/quarry.spec")).unwrap());

        let other = StoreSpec::new("framed").with_arg("checksum", false);
        assert!(Store::create(Arc::clone(&fs), "/s/a", &other, false)
            .unwrap_err()
            .is_invalid_argument());

        // structure-only specs only compare structures
        assert!(Store::create(Arc::clone(&fs), "/s/c", &StoreSpec::for_structure("default"), false).is_ok());
        assert!(Store::create(fs, "/s/d", &StoreSpec::for_structure("text"), false)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn open_missing_store_is_not_found() {
        let fs = mem();
        assert!(matches!(
            Store::open(Arc::clone(&fs), "/nothing"),
            Err(CoreError::NotFound { .. })
        ));
        fs.mkdirs(Path::new("/dir")).unwrap();
        assert!(matches!(
            Store::open(fs, "/dir"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn nested_descriptors_are_a_configuration_error() {
        let fs = mem();
        Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        StoreSpec::default().write_to(fs.as_ref(), Path::new("/s/inner")).unwrap();
        assert!(matches!(
            Store::open(fs, "/s/inner"),
            Err(CoreError::Configuration { .. })
        ));
    }

    #[test]
    fn raw_write_and_read() {
        let fs = mem();
        let store = Store::create(fs, "/s", &StoreSpec::default(), true).unwrap();
        write(&store, "a/file1", &["x", "y"]);
        write(&store, "file2", &["z"]);

        let one: Vec<_> = collect_records(store.open_read("a/file1").unwrap()).unwrap();
        assert_eq!(one, vec![b"x".to_vec(), b"y".to_vec()]);
        assert_eq!(read_all(&store), vec!["x", "y", "z"]);
        assert_eq!(store.user_file_names().unwrap(), vec!["a/file1", "file2"]);
        assert!(matches!(
            store.open_read("missing"),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn write_without_overwrite_rejects_existing_file() {
        let fs = mem();
        let store = Store::create(fs, "/s", &StoreSpec::default(), true).unwrap();
        write(&store, "f", &["1"]);

        let mut session = store.open_write("f", false).unwrap();
        let failed = session.write(b"2").is_err() || session.close().is_err();
        assert!(failed);

        let mut session = store.open_write("f", true).unwrap();
        session.write(b"3").unwrap();
        session.close().unwrap();
        assert_eq!(read_all(&store), vec!["3"]);
    }

    #[test]
    fn reserved_names_are_rejected() {
        let fs = mem();
        let store = Store::create(fs, "/s", &StoreSpec::default(), true).unwrap();
        for name in ["_tmp/f", "a/_b/f", "quarry.spec", ""] {
            assert!(store.open_write(name, false).unwrap_err().is_invalid_argument());
        }
        assert!(store.write_metadata("_x", "v").is_err());
        assert!(store.sub_store("_scratch").is_err());
    }

    #[test]
    fn scratch_directories_are_not_listed() {
        let fs = mem();
        let store = Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        write(&store, "a", &["1"]);
        fs.write_all(Path::new("/s/_tmp/b.qrec"), b"", false).unwrap();
        assert_eq!(store.stored_files().unwrap(), vec![PathBuf::from("/s/a.qrec")]);
        assert_eq!(store.attrs_at("").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn sub_store_sees_only_its_subtree() {
        let fs = mem();
        let store = Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        write(&store, "a/1", &["a1"]);
        write(&store, "b/1", &["b1"]);

        let sub = store.sub_store("a").unwrap();
        assert!(!sub.at_root());
        assert_eq!(sub.attrs(), vec!["a".to_string()]);
        assert_eq!(read_all(&sub), vec!["a1"]);

        let fresh = store.sub_store("c/d").unwrap();
        assert!(fs.exists(Path::new("/s/c/d")).unwrap());
        assert!(fresh.is_empty().unwrap());
        assert_eq!(store.attrs_at("").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn metadata_is_independent_of_records() {
        let fs = mem();
        let store = Store::create(fs, "/s", &StoreSpec::default(), true).unwrap();
        assert_eq!(store.metadata("m").unwrap(), None);
        store.write_metadata("m", "v1").unwrap();
        store.write_metadata("m", "v2").unwrap();
        store.write_metadata("x/y", "deep").unwrap();
        assert_eq!(store.metadata("m").unwrap().as_deref(), Some("v2"));
        assert_eq!(store.metadata_file_names().unwrap(), vec!["m", "x/y"]);
        assert_eq!(store.metadata_file_names_at("x").unwrap(), vec!["y"]);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn clear_keeps_directories_and_metadata() {
        let fs = mem();
        let store = Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        write(&store, "a/1", &["1"]);
        write(&store, "2", &["2"]);
        store.write_metadata("a/m", "keep").unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty().unwrap());
        assert!(fs.exists(Path::new("/s/a")).unwrap());
        assert_eq!(store.metadata("a/m").unwrap().as_deref(), Some("keep"));
    }

    #[test]
    fn delete_removes_one_file() {
        let fs = mem();
        let store = Store::create(fs, "/s", &StoreSpec::default(), true).unwrap();
        write(&store, "a", &["1"]);
        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
    }

    #[test]
    fn mk_attr_creates_directory() {
        let fs = mem();
        let store = Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        store.mk_attr("w/s").unwrap();
        assert_eq!(store.attrs_at("w").unwrap(), vec!["s"]);
    }

    #[test]
    fn works_on_local_file_system() {
        let dir = tempdir().unwrap();
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        let path = dir.path().join("store");
        let store = Store::create(Arc::clone(&fs), &path, &StoreSpec::default(), true).unwrap();
        write(&store, "p/f", &["local"]);

        let reopened = Store::open(fs, &path).unwrap();
        assert_eq!(read_all(&reopened), vec!["local"]);
    }
}
