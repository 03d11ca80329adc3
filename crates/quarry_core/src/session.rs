//! Write sessions.
//!
//! A session owns one record writer per stored file it touches. Writers are
//! opened on first use: a raw session opens at most one, a typed session
//! opens one per partition directory its records are routed to. Closing the
//! session closes (and thereby publishes) every writer it opened. Dropping a
//! session without closing it publishes nothing.

use crate::error::{CoreError, CoreResult};
use crate::paths;
use crate::store::Store;
use crate::structure::TypedStructure;
use quarry_format::RecordWriter;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A session writing records into a store.
pub struct WriteSession {
    store: Store,
    file_name: String,
    overwrite: bool,
    writers: HashMap<String, Box<dyn RecordWriter>>,
    records: u64,
}

impl WriteSession {
    pub(crate) fn new(store: Store, file_name: String, overwrite: bool) -> Self {
        Self {
            store,
            file_name,
            overwrite,
            writers: HashMap::new(),
            records: 0,
        }
    }

    /// Appends a record to the session's stored file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write(&mut self, record: &[u8]) -> CoreResult<()> {
        let name = self.file_name.clone();
        self.write_named(name, record)
    }

    /// Routes a record to `target`, given as directory components from the
    /// store's physical root.
    ///
    /// The session's file name is placed inside that directory.
    pub(crate) fn write_routed(&mut self, target: &[String], record: &[u8]) -> CoreResult<()> {
        let attrs = self.store.attrs();
        if !target.starts_with(&attrs) {
            return Err(CoreError::invalid_argument(format!(
                "target {target:?} lies outside the view rooted at {attrs:?}"
            )));
        }
        let relative = target[attrs.len()..].join("/");
        let name = paths::join(&relative, &self.file_name);
        if !self.writers.contains_key(&name) {
            paths::check_name(&name)?;
            self.store.check_valid_target(target, &name)?;
        }
        self.write_named(name, record)
    }

    fn write_named(&mut self, name: String, record: &[u8]) -> CoreResult<()> {
        let writer = match self.writers.entry(name) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = self.store.to_stored_path(entry.key());
                let writer =
                    self.store
                        .format()
                        .open_writer(self.store.fs().as_ref(), &path, self.overwrite)?;
                entry.insert(writer)
            }
        };
        writer.write_record(record)?;
        self.records += 1;
        Ok(())
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Returns the number of stored files the session has opened.
    #[must_use]
    pub fn files_opened(&self) -> usize {
        self.writers.len()
    }

    /// Closes every writer, publishing the files.
    ///
    /// All writers are closed even if one fails; the first failure is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while closing.
    pub fn close(self) -> CoreResult<()> {
        let mut first_error = None;
        for (_, writer) in self.writers {
            if let Err(e) = writer.close() {
                first_error.get_or_insert(CoreError::from(e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for WriteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSession")
            .field("store", &self.store.instance_root())
            .field("file_name", &self.file_name)
            .field("open_files", &self.writers.len())
            .field("records", &self.records)
            .finish()
    }
}

/// A session writing typed records, each routed to the partition its
/// structure assigns.
pub struct TypedWriteSession<S: TypedStructure> {
    inner: WriteSession,
    structure: Arc<S>,
}

impl<S: TypedStructure> TypedWriteSession<S> {
    pub(crate) fn new(inner: WriteSession, structure: Arc<S>) -> Self {
        Self { inner, structure }
    }

    /// Serializes `record` and writes it to its partition.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the partition is not a
    /// valid target or lies outside this view, and propagates encoding and
    /// backend errors.
    pub fn write(&mut self, record: &S::Record) -> CoreResult<()> {
        let target = self.structure.target(record);
        let bytes = self.structure.serialize(record)?;
        self.inner.write_routed(&target, &bytes)
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.inner.records_written()
    }

    /// Returns the number of stored files the session has opened.
    #[must_use]
    pub fn files_opened(&self) -> usize {
        self.inner.files_opened()
    }

    /// Closes every writer, publishing the files.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while closing.
    pub fn close(self) -> CoreResult<()> {
        self.inner.close()
    }
}

impl<S: TypedStructure> fmt::Debug for TypedWriteSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedWriteSession")
            .field("structure", &self.structure.identity())
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::StoreSpec;
    use quarry_storage::{FileSystem, MemoryFileSystem};
    use std::path::Path;

    fn store() -> (Arc<dyn FileSystem>, Store) {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let store = Store::create(Arc::clone(&fs), "/s", &StoreSpec::default(), true).unwrap();
        (fs, store)
    }

    #[test]
    fn unclosed_session_publishes_nothing() {
        let (fs, store) = store();
        let mut session = store.open_write("f", false).unwrap();
        session.write(b"lost").unwrap();
        drop(session);
        assert!(!fs.exists(Path::new("/s/f.qrec")).unwrap());
    }

    #[test]
    fn empty_session_creates_no_file() {
        let (_fs, store) = store();
        let session = store.open_write("f", false).unwrap();
        assert_eq!(session.files_opened(), 0);
        session.close().unwrap();
        assert!(store.stored_files().unwrap().is_empty());
    }

    #[test]
    fn routed_writes_fan_out_per_directory() {
        let (_fs, store) = store();
        let mut session = WriteSession::new(store.clone(), "part".into(), false);
        session.write_routed(&["a".into()], b"1").unwrap();
        session.write_routed(&["b".into()], b"2").unwrap();
        session.write_routed(&["a".into()], b"3").unwrap();
        assert_eq!(session.files_opened(), 2);
        assert_eq!(session.records_written(), 3);
        session.close().unwrap();
        assert_eq!(store.user_file_names().unwrap(), vec!["a/part", "b/part"]);
    }

    #[test]
    fn routed_writes_outside_view_are_rejected() {
        let (_fs, store) = store();
        let view = store.sub_store("a").unwrap();
        let mut session = WriteSession::new(view, "part".into(), false);
        session.write_routed(&["a".into(), "x".into()], b"ok").unwrap();
        let err = session.write_routed(&["b".into()], b"no").unwrap_err();
        assert!(err.is_invalid_argument());
        session.close().unwrap();
        assert_eq!(store.user_file_names().unwrap(), vec!["a/x/part"]);
    }
}
