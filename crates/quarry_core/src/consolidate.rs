//! Consolidation: merging many small stored files into fewer large ones.
//!
//! Consolidation works leaf by leaf (see [`Store::leaves`]) and never moves
//! a record across a partition boundary. Within a leaf, stored files are
//! packed greedily, in listing order, into groups whose total size stays
//! within the budget. Each group with more than one file is rewritten as one
//! new file in the leaf directory; a file at or over the budget is left
//! alone. Replacement files are verified by record count before any
//! original is deleted. Metadata is never touched.
//!
//! Consolidation is not crash safe and must not run concurrently with
//! readers or writers of the same leaf.

use crate::error::{CoreError, CoreResult};
use crate::paths::EXTENSION;
use crate::store::Store;
use quarry_storage::FileStatus;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Consolidation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsolidationResult {
    /// Leaves visited.
    pub leaves: usize,
    /// Stored files before consolidation.
    pub files_before: usize,
    /// Stored files after consolidation.
    pub files_after: usize,
    /// Records rewritten into merged files.
    pub records: u64,
    /// Bytes of the files that were merged.
    pub bytes: u64,
}

impl ConsolidationResult {
    /// Returns how many files consolidation removed.
    #[must_use]
    pub fn files_removed(&self) -> usize {
        self.files_before.saturating_sub(self.files_after)
    }
}

impl Store {
    /// Consolidates every leaf with the configured size budget.
    ///
    /// # Errors
    ///
    /// See [`Store::consolidate_with`].
    pub fn consolidate(&self) -> CoreResult<ConsolidationResult> {
        self.consolidate_with(self.config().consolidation_max_size)
    }

    /// Consolidates every leaf so that merged files stay within `max_size`
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] if the tree contradicts the
    /// structure or a merged file fails verification, and propagates read,
    /// write and backend errors.
    pub fn consolidate_with(&self, max_size: u64) -> CoreResult<ConsolidationResult> {
        let max_size = max_size.max(1);
        let mut result = ConsolidationResult::default();
        for leaf in self.leaves()? {
            self.consolidate_leaf(&leaf, max_size, &mut result)?;
            result.leaves += 1;
        }
        info!(
            store = %self.instance_root().display(),
            leaves = result.leaves,
            files_before = result.files_before,
            files_after = result.files_after,
            records = result.records,
            "consolidated store"
        );
        Ok(result)
    }

    fn consolidate_leaf(
        &self,
        leaf: &str,
        max_size: u64,
        result: &mut ConsolidationResult,
    ) -> CoreResult<()> {
        let dir = self.dir_path(leaf);
        let files: Vec<FileStatus> = self
            .list_recursive(&dir)?
            .into_iter()
            .filter(|f| f.name().ends_with(EXTENSION))
            .collect();
        result.files_before += files.len();

        let groups = pack(files, max_size);
        let mut merged = Vec::new();
        for group in &groups {
            if group.len() < 2 {
                result.files_after += group.len();
                continue;
            }
            let target = dir.join(format!("{}{EXTENSION}", Uuid::new_v4()));
            let records = self.merge(group, &target)?;
            result.files_after += 1;
            result.records += records;
            result.bytes += group.iter().map(|f| f.len).sum::<u64>();
            merged.push(group);
        }

        for group in merged {
            for file in group {
                self.fs().delete(&file.path, false)?;
            }
        }
        debug!(
            leaf = if leaf.is_empty() { "<root>" } else { leaf },
            groups = groups.len(),
            "consolidated leaf"
        );
        Ok(())
    }

    /// Writes every record of `group` into `target` and verifies the count.
    fn merge(&self, group: &[FileStatus], target: &Path) -> CoreResult<u64> {
        let fs = self.fs().as_ref();
        let format = self.format();
        let mut writer = format.open_writer(fs, target, false)?;
        let mut written = 0u64;
        for file in group {
            let mut reader = format.open_reader(fs, &file.path)?;
            while let Some(record) = reader.read_record()? {
                writer.write_record(&record)?;
                written += 1;
            }
        }
        writer.close()?;

        let mut reader = format.open_reader(fs, target)?;
        let mut read = 0u64;
        while reader.read_record()?.is_some() {
            read += 1;
        }
        if read != written {
            fs.delete(target, false)?;
            return Err(CoreError::illegal_state(format!(
                "merged file {} holds {read} records, expected {written}",
                target.display()
            )));
        }
        Ok(written)
    }
}

/// Greedily packs files, in order, into groups of at most `max_size` bytes.
/// A file at or over the budget forms a group of its own and does not close
/// the group being filled.
fn pack(files: Vec<FileStatus>, max_size: u64) -> Vec<Vec<FileStatus>> {
    let mut groups = Vec::new();
    let mut current: Vec<FileStatus> = Vec::new();
    let mut current_size = 0u64;
    for file in files {
        if file.len >= max_size {
            groups.push(vec![file]);
            continue;
        }
        if current_size + file.len > max_size && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current_size += file.len;
        current.push(file);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}
