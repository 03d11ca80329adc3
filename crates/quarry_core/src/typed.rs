//! Typed store façade.

use crate::config::Config;
use crate::error::CoreResult;
use crate::iter::TypedRecords;
use crate::session::{TypedWriteSession, WriteSession};
use crate::spec::StoreSpec;
use crate::store::Store;
use crate::structure::{Structure, TypedStructure};
use quarry_storage::FileSystem;
use std::fmt;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// A store whose records are routed and encoded by a [`TypedStructure`].
///
/// Dereferences to the underlying [`Store`] for listing, metadata, append
/// and consolidation.
pub struct TypedStore<S: TypedStructure> {
    store: Store,
    structure: Arc<S>,
}

impl<S: TypedStructure> Clone for TypedStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            structure: Arc::clone(&self.structure),
        }
    }
}

impl<S: TypedStructure> TypedStore<S> {
    /// Creates a store using `structure` and the default format.
    ///
    /// # Errors
    ///
    /// See [`Store::create`].
    pub fn create(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        structure: S,
        fail_on_exists: bool,
    ) -> CoreResult<Self> {
        let spec = StoreSpec::for_structure(structure.identity());
        Self::create_with_spec(fs, path, structure, &spec, fail_on_exists, Config::default())
    }

    /// Creates a store using `structure` with an explicit spec and
    /// configuration. The spec's structure identity is taken from
    /// `structure`.
    ///
    /// # Errors
    ///
    /// See [`Store::create`].
    pub fn create_with_spec(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        structure: S,
        spec: &StoreSpec,
        fail_on_exists: bool,
        config: Config,
    ) -> CoreResult<Self> {
        let structure = Arc::new(structure);
        let spec = spec.clone().with_structure(structure.identity());
        let shared: Arc<dyn Structure> = structure.clone();
        let store =
            Store::create_inner(fs, path.as_ref(), &spec, fail_on_exists, config, Some(shared))?;
        Ok(Self { store, structure })
    }

    /// Opens an existing store that uses `structure`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`](crate::CoreError::InvalidArgument)
    /// if the store uses another structure, otherwise see [`Store::open`].
    pub fn open(fs: Arc<dyn FileSystem>, path: impl AsRef<Path>, structure: S) -> CoreResult<Self> {
        Self::open_with(fs, path, structure, Config::default())
    }

    /// Opens an existing store with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`TypedStore::open`].
    pub fn open_with(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        structure: S,
        config: Config,
    ) -> CoreResult<Self> {
        let structure = Arc::new(structure);
        let shared: Arc<dyn Structure> = structure.clone();
        let store = Store::open_inner(fs, path.as_ref(), config, Some(shared))?;
        Ok(Self { store, structure })
    }

    /// Returns the untyped store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Returns the typed structure.
    #[must_use]
    pub fn typed_structure(&self) -> &Arc<S> {
        &self.structure
    }

    /// Opens a typed session writing to a fresh UUID-named file in every
    /// partition it touches.
    ///
    /// # Errors
    ///
    /// See [`TypedStore::open_write_named`].
    pub fn open_write(&self) -> CoreResult<TypedWriteSession<S>> {
        self.open_write_named(&Uuid::new_v4().to_string(), false)
    }

    /// Opens a typed session writing to `file_name` in every partition it
    /// touches.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`](crate::CoreError::InvalidArgument)
    /// for reserved names.
    pub fn open_write_named(&self, file_name: &str, overwrite: bool) -> CoreResult<TypedWriteSession<S>> {
        crate::paths::check_name(file_name)?;
        let inner = WriteSession::new(self.store.clone(), file_name.to_string(), overwrite);
        Ok(TypedWriteSession::new(inner, Arc::clone(&self.structure)))
    }

    /// Writes every record in one session and closes it.
    ///
    /// # Errors
    ///
    /// Returns the first write or close error.
    pub fn write_all<'a, I>(&self, records: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = &'a S::Record>,
        S::Record: 'a,
    {
        let mut session = self.open_write()?;
        for record in records {
            session.write(record)?;
        }
        session.close()
    }

    /// Opens a typed reader over the stored file `name`.
    ///
    /// # Errors
    ///
    /// See [`Store::open_read`].
    pub fn open_read(&self, name: &str) -> CoreResult<TypedRecords<S>> {
        Ok(TypedRecords::new(
            self.store.open_read(name)?,
            Arc::clone(&self.structure),
        ))
    }

    /// Returns a fresh sequence over every decoded record in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn iter(&self) -> CoreResult<TypedRecords<S>> {
        Ok(TypedRecords::new(
            self.store.iter()?,
            Arc::clone(&self.structure),
        ))
    }

    /// Returns a typed view rooted at `relative`.
    ///
    /// # Errors
    ///
    /// See [`Store::sub_store`].
    pub fn sub_store(&self, relative: &str) -> CoreResult<Self> {
        Ok(Self {
            store: self.store.sub_store(relative)?,
            structure: Arc::clone(&self.structure),
        })
    }
}

impl<S: TypedStructure> Deref for TypedStore<S> {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl<S: TypedStructure> fmt::Debug for TypedStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedStore")
            .field("store", &self.store)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::iter::collect_records;
    use crate::structure::{RecordType, TextStructure};
    use quarry_storage::MemoryFileSystem;

    /// Routes each string to a directory named after its first letter.
    #[derive(Debug)]
    struct FirstLetter;

    impl Structure for FirstLetter {
        fn identity(&self) -> &str {
            "first-letter"
        }

        fn record_type(&self) -> RecordType {
            RecordType::TEXT
        }

        fn is_valid_target(&self, dirs: &[&str]) -> bool {
            dirs.len() == 1 && dirs[0].len() == 1
        }
    }

    impl TypedStructure for FirstLetter {
        type Record = String;

        fn target(&self, record: &String) -> Vec<String> {
            vec![record.chars().take(1).collect()]
        }

        fn serialize(&self, record: &String) -> CoreResult<Vec<u8>> {
            TextStructure.serialize(record)
        }

        fn deserialize(&self, bytes: &[u8]) -> CoreResult<String> {
            TextStructure.deserialize(bytes)
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn typed_writes_fan_out_and_read_back() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let store = TypedStore::create(fs, "/t", FirstLetter, true).unwrap();
        let records = strings(&["apple", "avocado", "banana", "cherry"]);
        store.write_all(&records).unwrap();

        assert_eq!(store.attrs_at("").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.stored_files().unwrap().len(), 3);

        let mut read = collect_records(store.iter().unwrap()).unwrap();
        read.sort();
        assert_eq!(read, records);

        let a = store.sub_store("a").unwrap();
        assert_eq!(collect_records(a.iter().unwrap()).unwrap(), strings(&["apple", "avocado"]));
    }

    #[test]
    fn typed_open_checks_structure_identity() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        TypedStore::create(Arc::clone(&fs), "/t", FirstLetter, true).unwrap();
        assert!(TypedStore::open(Arc::clone(&fs), "/t", FirstLetter).is_ok());
        assert!(TypedStore::open(fs, "/t", TextStructure)
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn invalid_targets_fail_immediately() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let store = TypedStore::create(fs, "/t", FirstLetter, true).unwrap();
        let mut session = store.open_write().unwrap();
        assert!(matches!(
            session.write(&String::new()),
            Err(CoreError::InvalidArgument { .. })
        ));
        session.write(&"ok".to_string()).unwrap();
        session.close().unwrap();
        assert_eq!(store.user_file_names().unwrap().len(), 1);
    }

    #[test]
    fn untyped_open_of_custom_structure_needs_registration() {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        TypedStore::create(Arc::clone(&fs), "/t", FirstLetter, true).unwrap();
        assert!(matches!(
            Store::open(fs, "/t"),
            Err(CoreError::Configuration { .. })
        ));
    }
}
