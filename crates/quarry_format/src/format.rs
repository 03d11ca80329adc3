//! Record format traits.

use crate::args::FormatArgs;
use crate::error::FormatResult;
use quarry_storage::FileSystem;
use std::fmt::Debug;
use std::path::Path;

/// A byte range of a record file that starts and ends on record boundaries.
///
/// Splits let a bulk processor hand disjoint parts of one file to separate
/// workers. The format only describes the boundaries; it does not schedule
/// or execute anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    /// Offset of the first byte of the first record in the range.
    pub start: u64,
    /// Length of the range in bytes.
    pub len: u64,
}

impl Split {
    /// Returns the offset one past the last byte of the range.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// A pluggable record file format.
///
/// Implementations serialize a sequence of variable-length records into one
/// physical file and read them back in the same order.
pub trait RecordFormat: Send + Sync + Debug {
    /// Returns the name the format is registered under.
    fn name(&self) -> &str;

    /// Returns the arguments the format was created with.
    fn args(&self) -> &FormatArgs;

    /// Opens a writer that will create the file at `path` when closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists and `overwrite` is false, or if
    /// the file cannot be created.
    fn open_writer(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
        overwrite: bool,
    ) -> FormatResult<Box<dyn RecordWriter>>;

    /// Opens a reader over the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its header is invalid.
    fn open_reader(&self, fs: &dyn FileSystem, path: &Path) -> FormatResult<Box<dyn RecordReader>>;

    /// Describes record-aligned splits of roughly `target_len` bytes each.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is corrupted.
    fn splits(&self, fs: &dyn FileSystem, path: &Path, target_len: u64) -> FormatResult<Vec<Split>>;
}

/// Sequential writer for one record file.
pub trait RecordWriter: Send {
    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    fn write_record(&mut self, record: &[u8]) -> FormatResult<()>;

    /// Finishes the file and makes it visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be committed.
    fn close(self: Box<Self>) -> FormatResult<()>;
}

/// Sequential reader for one record file.
pub trait RecordReader: Send {
    /// Returns the next record, or `None` once the file is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is truncated or corrupted.
    fn read_record(&mut self) -> FormatResult<Option<Vec<u8>>>;
}

/// Reads every record of the file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn read_all_records(
    format: &dyn RecordFormat,
    fs: &dyn FileSystem,
    path: &Path,
) -> FormatResult<Vec<Vec<u8>>> {
    let mut reader = format.open_reader(fs, path)?;
    let mut records = Vec::new();
    while let Some(record) = reader.read_record()? {
        records.push(record);
    }
    Ok(records)
}
