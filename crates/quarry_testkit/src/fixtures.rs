//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores on the memory
//! and local file systems.

use quarry_core::{collect_records, CoreResult, Store, StoreSpec};
use quarry_storage::{FileSystem, LocalFileSystem, MemoryFileSystem};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// The file system holding the store.
    pub fs: Arc<dyn FileSystem>,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a default store at `/store` on a fresh memory file system.
    pub fn memory() -> Self {
        Self::memory_with_spec(&StoreSpec::default())
    }

    /// Creates a store with `spec` at `/store` on a fresh memory file system.
    pub fn memory_with_spec(spec: &StoreSpec) -> Self {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let store = Store::create(Arc::clone(&fs), "/store", spec, true)
            .expect("Failed to create memory store");
        Self {
            store,
            fs,
            _temp_dir: None,
        }
    }

    /// Creates a default store inside a temporary directory.
    pub fn local() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        let store = Store::create(
            Arc::clone(&fs),
            temp_dir.path().join("store"),
            &StoreSpec::default(),
            true,
        )
        .expect("Failed to create local store");
        Self {
            store,
            fs,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the temporary directory if file-based, None if in memory.
    pub fn temp_path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust
/// use quarry_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     assert!(store.is_empty().unwrap());
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Runs a test with a store on the local file system.
pub fn with_local_store<F, R>(f: F) -> R
where
    F: FnOnce(&Store, &Path) -> R,
{
    let test_store = TestStore::local();
    let path = test_store.temp_path().expect("Local store should have a path");
    f(&test_store.store, &path)
}

/// Installs a `tracing` subscriber for tests.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Safe to call
/// from every test.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Collects an iterator of records and sorts them.
pub fn sorted_records<T: Ord>(records: impl Iterator<Item = CoreResult<T>>) -> Vec<T> {
    let mut records = collect_records(records).expect("Failed to read records");
    records.sort();
    records
}

/// Writes `records` to the stored file `name` in one session.
pub fn write_file(store: &Store, name: &str, records: &[&[u8]]) {
    let mut session = store.open_write(name, false).expect("Failed to open session");
    for record in records {
        session.write(record).expect("Failed to write record");
    }
    session.close().expect("Failed to close session");
}

/// Writes UTF-8 `records` to the stored file `name` in one session.
pub fn write_strings(store: &Store, name: &str, records: &[&str]) {
    let bytes: Vec<&[u8]> = records.iter().map(|r| r.as_bytes()).collect();
    write_file(store, name, &bytes);
}

/// Reads every record of the store, sorted.
pub fn all_records(store: &Store) -> Vec<Vec<u8>> {
    sorted_records(store.iter().expect("Failed to iterate store"))
}

/// Reads every record of the store as UTF-8, sorted.
pub fn all_strings(store: &Store) -> Vec<String> {
    all_records(store)
        .into_iter()
        .map(|r| String::from_utf8(r).expect("Record is not UTF-8"))
        .collect()
}

/// Asserts that the store holds exactly `expected`, in any order.
pub fn assert_contents(store: &Store, expected: &[&str]) {
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(all_strings(store), expected, "contents of {}", store.instance_root().display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let test_store = TestStore::memory();
        assert!(test_store.is_empty().unwrap());
        assert!(test_store.at_root());
    }

    #[test]
    fn test_local_store() {
        with_local_store(|store, dir| {
            write_file(store, "a", &[b"x"]);
            assert!(store.root().starts_with(dir));
            assert_eq!(all_records(store), vec![b"x".to_vec()]);
        });
    }

    #[test]
    fn test_write_file_and_read_back() {
        with_temp_store(|store| {
            write_file(store, "p/one", &[b"b", b"a"]);
            assert_eq!(all_records(store), vec![b"a".to_vec(), b"b".to_vec()]);
        });
    }
}
