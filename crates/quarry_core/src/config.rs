//! Store configuration.

use crate::append::RenameMode;
use crate::transfer::{BulkCopier, RecordTranscoder, SequentialCopier, Transcoder};
use std::sync::Arc;

/// Default size budget of one consolidated file.
pub const DEFAULT_CONSOLIDATION_SIZE: u64 = 127 * 1024 * 1024;

/// Configuration for creating or opening a store.
///
/// Sub-stores and snapshots inherit the configuration of the store they were
/// derived from.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size budget of one consolidated file, in bytes.
    pub consolidation_max_size: u64,

    /// Rename mode used when [`CopyArgs`](crate::CopyArgs) leaves it unset.
    pub default_rename_mode: RenameMode,

    /// Collaborator that copies files between stores of the same format.
    pub copier: Arc<dyn BulkCopier>,

    /// Collaborator that re-encodes files between stores of different formats.
    pub transcoder: Arc<dyn Transcoder>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            consolidation_max_size: DEFAULT_CONSOLIDATION_SIZE,
            default_rename_mode: RenameMode::AlwaysRename,
            copier: Arc::new(SequentialCopier),
            transcoder: Arc::new(RecordTranscoder),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the consolidation size budget.
    #[must_use]
    pub fn consolidation_max_size(mut self, size: u64) -> Self {
        self.consolidation_max_size = size;
        self
    }

    /// Sets the rename mode used when none is given.
    #[must_use]
    pub fn default_rename_mode(mut self, mode: RenameMode) -> Self {
        self.default_rename_mode = mode;
        self
    }

    /// Replaces the bulk copy collaborator.
    #[must_use]
    pub fn copier(mut self, copier: Arc<dyn BulkCopier>) -> Self {
        self.copier = copier;
        self
    }

    /// Replaces the transcoding collaborator.
    #[must_use]
    pub fn transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = transcoder;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.consolidation_max_size, 127 * 1024 * 1024);
        assert_eq!(config.default_rename_mode, RenameMode::AlwaysRename);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .consolidation_max_size(1024)
            .default_rename_mode(RenameMode::RenameIfNecessary);

        assert_eq!(config.consolidation_max_size, 1024);
        assert_eq!(config.default_rename_mode, RenameMode::RenameIfNecessary);
    }
}
