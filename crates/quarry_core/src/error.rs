//! Error types for Quarry core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Quarry core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// File system error.
    #[error("storage error: {0}")]
    Storage(#[from] quarry_storage::StorageError),

    /// Record format error.
    #[error("format error: {0}")]
    Format(#[from] quarry_format::FormatError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The caller passed an argument the store cannot accept.
    ///
    /// Covers invalid partition targets, reserved path components, spec
    /// mismatches, rename collisions, slice-ordering violations and the
    /// other caller-correctable conditions.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The on-disk layout is inconsistent in a way the caller cannot fix.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// A store or slice does not exist.
    #[error("not found: {message}")]
    NotFound {
        /// What was missing.
        message: String,
    },

    /// The store's contents contradict its declared structure.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the problem.
        message: String,
    },

    /// A record or descriptor could not be (de)serialized.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns true for caller-correctable argument errors.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}
