//! Record iteration.

use crate::error::{CoreError, CoreResult};
use crate::structure::TypedStructure;
use quarry_format::{RecordFormat, RecordReader};
use quarry_storage::FileSystem;
use std::fmt;
use std::iter::FusedIterator;
use std::path::PathBuf;
use std::sync::Arc;

/// Sequence of raw records read from a list of stored files.
///
/// Files are opened one at a time, in the order given. The next record is
/// always read ahead of the caller, so the first record (or the first error)
/// is fetched at construction. Once the sequence is exhausted, or after the
/// first error, it keeps returning `None`.
pub struct Records {
    fs: Arc<dyn FileSystem>,
    format: Arc<dyn RecordFormat>,
    files: std::vec::IntoIter<PathBuf>,
    reader: Option<Box<dyn RecordReader>>,
    next: Option<CoreResult<Vec<u8>>>,
}

impl Records {
    pub(crate) fn new(
        fs: Arc<dyn FileSystem>,
        format: Arc<dyn RecordFormat>,
        files: Vec<PathBuf>,
    ) -> Self {
        let mut records = Self {
            fs,
            format,
            files: files.into_iter(),
            reader: None,
            next: None,
        };
        records.next = records.fetch();
        records
    }

    /// Returns the record the next call to `next` will yield.
    pub fn peek(&self) -> Option<&CoreResult<Vec<u8>>> {
        self.next.as_ref()
    }

    fn fetch(&mut self) -> Option<CoreResult<Vec<u8>>> {
        loop {
            if let Some(reader) = self.reader.as_mut() {
                match reader.read_record() {
                    Ok(Some(record)) => return Some(Ok(record)),
                    Ok(None) => self.reader = None,
                    Err(e) => return Some(Err(e.into())),
                }
            }
            let path = self.files.next()?;
            match self.format.open_reader(self.fs.as_ref(), &path) {
                Ok(reader) => self.reader = Some(reader),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    fn stop(&mut self) {
        self.reader = None;
        self.files = Vec::new().into_iter();
    }
}

impl Iterator for Records {
    type Item = CoreResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        match current {
            Ok(_) => self.next = self.fetch(),
            Err(_) => self.stop(),
        }
        Some(current)
    }
}

impl FusedIterator for Records {}

impl fmt::Debug for Records {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records")
            .field("format", &self.format.name())
            .field("remaining_files", &self.files.len())
            .field("exhausted", &self.next.is_none())
            .finish()
    }
}

/// Sequence of decoded records.
pub struct TypedRecords<S: TypedStructure> {
    inner: Records,
    structure: Arc<S>,
}

impl<S: TypedStructure> TypedRecords<S> {
    pub(crate) fn new(inner: Records, structure: Arc<S>) -> Self {
        Self { inner, structure }
    }
}

impl<S: TypedStructure> Iterator for TypedRecords<S> {
    type Item = CoreResult<S::Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = match self.inner.next()? {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(e)),
        };
        Some(self.structure.deserialize(&bytes))
    }
}

impl<S: TypedStructure> FusedIterator for TypedRecords<S> {}

impl<S: TypedStructure> fmt::Debug for TypedRecords<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedRecords")
            .field("structure", &self.structure.identity())
            .field("inner", &self.inner)
            .finish()
    }
}

/// Collects a record sequence, stopping at the first error.
///
/// # Errors
///
/// Returns the first error the sequence yields.
pub fn collect_records<T>(records: impl Iterator<Item = CoreResult<T>>) -> CoreResult<Vec<T>> {
    records.collect::<Result<Vec<_>, CoreError>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_format::FramedFormat;
    use quarry_storage::MemoryFileSystem;
    use std::path::Path;

    fn setup(files: &[(&str, &[&[u8]])]) -> (Arc<dyn FileSystem>, Arc<dyn RecordFormat>) {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let format: Arc<dyn RecordFormat> = Arc::new(FramedFormat::default());
        for (path, records) in files {
            let mut writer = format.open_writer(fs.as_ref(), Path::new(path), false).unwrap();
            for record in *records {
                writer.write_record(record).unwrap();
            }
            writer.close().unwrap();
        }
        (fs, format)
    }

    #[test]
    fn records_span_files_in_order() {
        let (fs, format) = setup(&[("/a", &[b"1", b"2"]), ("/b", &[]), ("/c", &[b"3"])]);
        let files = vec!["/a".into(), "/b".into(), "/c".into()];
        let records = collect_records(Records::new(fs, format, files)).unwrap();
        assert_eq!(records, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn records_read_ahead_and_fuse() {
        let (fs, format) = setup(&[("/a", &[b"x"])]);
        let mut records = Records::new(fs, format, vec!["/a".into()]);
        assert!(matches!(records.peek(), Some(Ok(r)) if r == b"x"));
        assert_eq!(records.next().unwrap().unwrap(), b"x");
        assert!(records.peek().is_none());
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }

    #[test]
    fn records_stop_after_error() {
        let (fs, format) = setup(&[("/b", &[b"y"])]);
        let mut records = Records::new(fs, format, vec!["/missing".into(), "/b".into()]);
        assert!(records.next().unwrap().is_err());
        assert!(records.next().is_none());
    }

    #[test]
    fn empty_file_list_yields_nothing() {
        let (fs, format) = setup(&[]);
        assert_eq!(Records::new(fs, format, Vec::new()).count(), 0);
    }
}
