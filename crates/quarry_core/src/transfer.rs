//! Bulk copy and transcoding collaborators.
//!
//! The append protocol decides *what* moves where, including every rename,
//! and hands the resulting list of [`FileTransfer`]s to a collaborator that
//! does the physical work. Swapping the collaborators (through
//! [`Config`](crate::Config)) lets a deployment plug in a parallel or
//! remote copier without touching the protocol.

use crate::error::CoreResult;
use quarry_format::RecordFormat;
use quarry_storage::FileSystem;
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a transferred file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// A stored record file.
    Records,
    /// A metadata side-car.
    Metadata,
}

/// One planned file transfer between two stores.
///
/// Destinations are final: collisions have already been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    /// Physical source path.
    pub source: PathBuf,
    /// Physical destination path.
    pub dest: PathBuf,
    /// What the file holds.
    pub kind: TransferKind,
}

/// Copies files verbatim between stores that share a record format.
pub trait BulkCopier: Send + Sync + Debug {
    /// Copies every transfer from `source` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; transfers completed before it stay
    /// in place.
    fn copy(
        &self,
        source: &dyn FileSystem,
        dest: &dyn FileSystem,
        transfers: &[FileTransfer],
    ) -> CoreResult<()>;
}

/// Re-encodes record files between stores with different record formats.
pub trait Transcoder: Send + Sync + Debug {
    /// Reads every record transfer with `source_format` and writes it with
    /// `dest_format`. Metadata transfers are copied verbatim.
    ///
    /// # Errors
    ///
    /// Returns the first read, write or backend error.
    fn transcode(
        &self,
        source: &dyn FileSystem,
        dest: &dyn FileSystem,
        transfers: &[FileTransfer],
        source_format: &dyn RecordFormat,
        dest_format: &dyn RecordFormat,
    ) -> CoreResult<()>;
}

/// Default [`BulkCopier`]: streams each file in turn.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialCopier;

impl BulkCopier for SequentialCopier {
    fn copy(
        &self,
        source: &dyn FileSystem,
        dest: &dyn FileSystem,
        transfers: &[FileTransfer],
    ) -> CoreResult<()> {
        for transfer in transfers {
            let bytes = copy_file(source, &transfer.source, dest, &transfer.dest)?;
            debug!(
                source = %transfer.source.display(),
                dest = %transfer.dest.display(),
                bytes,
                "copied file"
            );
        }
        Ok(())
    }
}

/// Default [`Transcoder`]: decodes and re-encodes one record at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordTranscoder;

impl Transcoder for RecordTranscoder {
    fn transcode(
        &self,
        source: &dyn FileSystem,
        dest: &dyn FileSystem,
        transfers: &[FileTransfer],
        source_format: &dyn RecordFormat,
        dest_format: &dyn RecordFormat,
    ) -> CoreResult<()> {
        for transfer in transfers {
            match transfer.kind {
                TransferKind::Metadata => {
                    copy_file(source, &transfer.source, dest, &transfer.dest)?;
                }
                TransferKind::Records => {
                    let mut reader = source_format.open_reader(source, &transfer.source)?;
                    let mut writer = dest_format.open_writer(dest, &transfer.dest, false)?;
                    let mut records = 0u64;
                    while let Some(record) = reader.read_record()? {
                        writer.write_record(&record)?;
                        records += 1;
                    }
                    writer.close()?;
                    debug!(
                        source = %transfer.source.display(),
                        dest = %transfer.dest.display(),
                        records,
                        from = source_format.name(),
                        to = dest_format.name(),
                        "transcoded file"
                    );
                }
            }
        }
        Ok(())
    }
}

fn copy_file(
    source: &dyn FileSystem,
    from: &Path,
    dest: &dyn FileSystem,
    to: &Path,
) -> CoreResult<u64> {
    let mut input = source.open(from)?;
    let mut output = dest.create(to, false)?;
    let bytes = io::copy(&mut input, &mut output)?;
    output.commit()?;
    Ok(bytes)
}
