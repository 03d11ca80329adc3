//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The path does not exist.
    #[error("path not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The path already exists and the operation refuses to replace it.
    #[error("path already exists: {}", path.display())]
    AlreadyExists {
        /// The conflicting path.
        path: PathBuf,
    },

    /// A directory was expected but a file was found (or vice versa).
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A non-recursive delete was attempted on a non-empty directory.
    #[error("directory not empty: {}", path.display())]
    DirectoryNotEmpty {
        /// The directory.
        path: PathBuf,
    },

    /// The path cannot be represented by this file system.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    /// Returns true if this error reports a missing path.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
