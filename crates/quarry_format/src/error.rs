//! Error types for the format crate.

use quarry_storage::StorageError;
use std::io;
use thiserror::Error;

/// Result type for format operations.
pub type FormatResult<T> = Result<T, FormatError>;

/// Errors that can occur while reading or writing record files.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The underlying file system failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// An I/O error occurred while streaming a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not follow the format's layout.
    #[error("corrupted record file: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A record's checksum did not match its payload.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the file.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// No format is registered under the requested name.
    #[error("unknown record format: {name}")]
    UnknownFormat {
        /// The requested format name.
        name: String,
    },

    /// The format arguments are not accepted by the format.
    #[error("invalid format arguments: {message}")]
    InvalidArgs {
        /// Description of the problem.
        message: String,
    },

    /// The record exceeds the largest frame the format can hold.
    #[error("record too large: {len} bytes")]
    RecordTooLarge {
        /// Length of the rejected record.
        len: usize,
    },
}

impl FormatError {
    /// Create a corrupted file error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Create an invalid arguments error.
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs {
            message: message.into(),
        }
    }
}
