//! Cross-store append: copy, move and absorb.
//!
//! Appending merges every stored file of a source store into a destination
//! store. The protocol runs in three phases:
//!
//! 1. **Validate** (skipped with `force`): the destination must accept the
//!    source's record type, and every source name must be a valid target of
//!    the destination's structure.
//! 2. **Plan**: each source file gets a destination path. Collisions are
//!    resolved by the [`RenameMode`]; metadata never renames and any
//!    metadata collision aborts. A failing plan leaves the destination
//!    untouched.
//! 3. **Transfer**: renames for a move, or the configured
//!    [`BulkCopier`](crate::BulkCopier) / [`Transcoder`](crate::Transcoder)
//!    for a copy.
//!
//! Transfers are not transactional. An interrupted append leaves an
//! unspecified subset of the source in the destination.

use crate::error::{CoreError, CoreResult};
use crate::paths;
use crate::store::Store;
use crate::transfer::{FileTransfer, TransferKind};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

/// Prefix of names minted to resolve collisions.
pub const RENAME_PREFIX: &str = "ma_";

/// How an append resolves destination name collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenameMode {
    /// Keep every name; any collision fails the append.
    NoRename,
    /// Give every file a freshly minted name.
    AlwaysRename,
    /// Keep names, minting new ones only where they collide.
    RenameIfNecessary,
}

/// Options for an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyArgs {
    /// Rename mode; `None` uses the destination's configured default.
    pub rename_mode: Option<RenameMode>,
    /// Skip the record type and structure checks and treat the formats as
    /// equal.
    pub force: bool,
    /// Transfer metadata files too.
    pub copy_metadata: bool,
}

impl Default for CopyArgs {
    fn default() -> Self {
        Self {
            rename_mode: None,
            force: false,
            copy_metadata: true,
        }
    }
}

impl CopyArgs {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rename mode.
    #[must_use]
    pub const fn rename_mode(mut self, mode: RenameMode) -> Self {
        self.rename_mode = Some(mode);
        self
    }

    /// Sets whether validation is skipped.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Sets whether metadata files are transferred.
    #[must_use]
    pub const fn copy_metadata(mut self, copy: bool) -> Self {
        self.copy_metadata = copy;
        self
    }
}

/// What an append did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendResult {
    /// Stored files transferred.
    pub files: usize,
    /// Metadata files transferred.
    pub metadata: usize,
    /// Stored files that received a minted name.
    pub renamed: usize,
    /// Whether the files were moved rather than copied.
    pub moved: bool,
}

struct Plan {
    transfers: Vec<FileTransfer>,
    files: usize,
    metadata: usize,
    renamed: usize,
}

impl Store {
    /// Copies every stored file of `source` into this store.
    ///
    /// Files are copied verbatim when both stores use the same format and
    /// re-encoded through the configured transcoder otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if validation or planning
    /// fails, before anything is transferred, and propagates backend errors.
    pub fn copy_append(&self, source: &Store, args: &CopyArgs) -> CoreResult<AppendResult> {
        let formats_same = self.check_combine_validity(source, args.force)?;
        self.copy_planned(source, args, formats_same)
    }

    /// Moves every stored file of `source` into this store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the stores live on different
    /// file systems, use different formats, or fail validation or planning.
    pub fn move_append(&self, source: &Store, args: &CopyArgs) -> CoreResult<AppendResult> {
        let formats_same = self.check_combine_validity(source, args.force)?;
        if !self.same_file_system(source) {
            return Err(CoreError::invalid_argument(format!(
                "cannot move from {} to {}: different file systems",
                source.fs().uri(),
                self.fs().uri()
            )));
        }
        if !formats_same {
            return Err(CoreError::invalid_argument(format!(
                "cannot move between formats '{}' and '{}'",
                source.format().name(),
                self.format().name()
            )));
        }
        self.move_planned(source, args)
    }

    /// Moves `source` into this store when that is possible, copies it
    /// otherwise.
    ///
    /// # Errors
    ///
    /// See [`Store::copy_append`].
    pub fn absorb(&self, source: &Store, args: &CopyArgs) -> CoreResult<AppendResult> {
        let formats_same = self.check_combine_validity(source, args.force)?;
        if formats_same && self.same_file_system(source) {
            self.move_planned(source, args)
        } else {
            self.copy_planned(source, args, formats_same)
        }
    }

    fn same_file_system(&self, other: &Store) -> bool {
        self.fs().uri() == other.fs().uri()
    }

    /// Validates that `source` may be appended into this store and returns
    /// whether both use the same format.
    fn check_combine_validity(&self, source: &Store, force: bool) -> CoreResult<bool> {
        if force {
            return Ok(true);
        }
        let ours = self.structure().record_type();
        let theirs = source.structure().record_type();
        if ours != theirs && !ours.is_bytes() {
            return Err(CoreError::invalid_argument(format!(
                "cannot append records of type '{}' into a store of type '{}'",
                theirs.name(),
                ours.name()
            )));
        }
        for name in source.user_file_names()? {
            self.check_valid_structure(&name)?;
        }
        Ok(self.format().name() == source.format().name()
            && self.format().args() == source.format().args())
    }

    fn plan(&self, source: &Store, args: &CopyArgs) -> CoreResult<Plan> {
        let mode = args.rename_mode.unwrap_or(self.config().default_rename_mode);
        let mut taken: HashSet<PathBuf> = HashSet::new();
        let mut plan = Plan {
            transfers: Vec::new(),
            files: 0,
            metadata: 0,
            renamed: 0,
        };

        for name in source.user_file_names()? {
            let candidate = self.to_stored_path(&name);
            let collides = taken.contains(&candidate) || self.fs().exists(&candidate)?;
            let dest = if collides || mode == RenameMode::AlwaysRename {
                if mode == RenameMode::NoRename {
                    return Err(CoreError::invalid_argument(format!(
                        "'{name}' already exists in {} and renaming is disabled",
                        self.instance_root().display()
                    )));
                }
                plan.renamed += 1;
                self.mint_name(&name, &taken)?
            } else {
                candidate
            };
            taken.insert(dest.clone());
            plan.transfers.push(FileTransfer {
                source: source.to_stored_path(&name),
                dest,
                kind: TransferKind::Records,
            });
            plan.files += 1;
        }

        if args.copy_metadata {
            for name in source.metadata_file_names()? {
                let dest = self.to_metadata_path(&name);
                if self.fs().exists(&dest)? {
                    return Err(CoreError::invalid_argument(format!(
                        "metadata '{name}' already exists in {}",
                        self.instance_root().display()
                    )));
                }
                plan.transfers.push(FileTransfer {
                    source: source.to_metadata_path(&name),
                    dest,
                    kind: TransferKind::Metadata,
                });
                plan.metadata += 1;
            }
        }
        Ok(plan)
    }

    /// Mints `parent(name)/ma_<uuid>`, unused both on disk and in this plan.
    fn mint_name(&self, name: &str, taken: &HashSet<PathBuf>) -> CoreResult<PathBuf> {
        let parent = paths::parent(name);
        loop {
            let minted = paths::join(parent, &format!("{RENAME_PREFIX}{}", Uuid::new_v4().simple()));
            let path = self.to_stored_path(&minted);
            if !taken.contains(&path) && !self.fs().exists(&path)? {
                return Ok(path);
            }
        }
    }

    fn copy_planned(&self, source: &Store, args: &CopyArgs, formats_same: bool) -> CoreResult<AppendResult> {
        let plan = self.plan(source, args)?;
        info!(
            source = %source.instance_root().display(),
            dest = %self.instance_root().display(),
            files = plan.files,
            metadata = plan.metadata,
            transcode = !formats_same,
            "copy-appending store"
        );
        if formats_same {
            self.config()
                .copier
                .copy(source.fs().as_ref(), self.fs().as_ref(), &plan.transfers)?;
        } else {
            self.config().transcoder.transcode(
                source.fs().as_ref(),
                self.fs().as_ref(),
                &plan.transfers,
                source.format().as_ref(),
                self.format().as_ref(),
            )?;
        }
        Ok(AppendResult {
            files: plan.files,
            metadata: plan.metadata,
            renamed: plan.renamed,
            moved: false,
        })
    }

    fn move_planned(&self, source: &Store, args: &CopyArgs) -> CoreResult<AppendResult> {
        let plan = self.plan(source, args)?;
        info!(
            source = %source.instance_root().display(),
            dest = %self.instance_root().display(),
            files = plan.files,
            metadata = plan.metadata,
            "move-appending store"
        );
        for transfer in &plan.transfers {
            self.fs().rename(&transfer.source, &transfer.dest)?;
            debug!(
                source = %transfer.source.display(),
                dest = %transfer.dest.display(),
                "moved file"
            );
        }
        Ok(AppendResult {
            files: plan.files,
            metadata: plan.metadata,
            renamed: plan.renamed,
            moved: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::collect_records;
    use crate::spec::StoreSpec;
    use quarry_storage::{FileSystem, MemoryFileSystem};
    use std::sync::Arc;

    fn pair() -> (Arc<dyn FileSystem>, Store, Store) {
        let fs: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let a = Store::create(Arc::clone(&fs), "/a", &StoreSpec::default(), true).unwrap();
        let b = Store::create(Arc::clone(&fs), "/b", &StoreSpec::default(), true).unwrap();
        (fs, a, b)
    }

    fn write(store: &Store, name: &str, record: &str) {
        let mut session = store.open_write(name, false).unwrap();
        session.write(record.as_bytes()).unwrap();
        session.close().unwrap();
    }

    fn sorted(store: &Store) -> Vec<Vec<u8>> {
        let mut records = collect_records(store.iter().unwrap()).unwrap();
        records.sort();
        records
    }

    #[test]
    fn copy_args_defaults() {
        let args = CopyArgs::default();
        assert_eq!(args.rename_mode, None);
        assert!(!args.force);
        assert!(args.copy_metadata);
    }

    #[test]
    fn no_rename_keeps_names_and_fails_on_collision() {
        let (_fs, a, b) = pair();
        write(&a, "x/1", "a1");
        write(&b, "x/1", "b1");
        write(&b, "x/2", "b2");

        let args = CopyArgs::new().rename_mode(RenameMode::NoRename);
        assert!(a.copy_append(&b, &args).unwrap_err().is_invalid_argument());
        // nothing was transferred
        assert_eq!(a.user_file_names().unwrap(), vec!["x/1"]);

        let (_fs, c, d) = pair();
        write(&d, "x/2", "d2");
        c.copy_append(&d, &args).unwrap();
        assert_eq!(c.user_file_names().unwrap(), vec!["x/2"]);
    }

    #[test]
    fn rename_if_necessary_renames_only_collisions() {
        let (_fs, a, b) = pair();
        write(&a, "x/1", "a1");
        write(&b, "x/1", "b1");
        write(&b, "x/2", "b2");

        let args = CopyArgs::new().rename_mode(RenameMode::RenameIfNecessary);
        let result = a.copy_append(&b, &args).unwrap();
        assert_eq!(result.files, 2);
        assert_eq!(result.renamed, 1);

        let names = a.user_file_names().unwrap();
        assert!(names.contains(&"x/1".to_string()));
        assert!(names.contains(&"x/2".to_string()));
        assert!(names.iter().any(|n| n.starts_with("x/ma_")));
        assert_eq!(sorted(&a), vec![b"a1".to_vec(), b"b1".to_vec(), b"b2".to_vec()]);
    }

    #[test]
    fn always_rename_mints_every_name() {
        let (_fs, a, b) = pair();
        write(&b, "x/1", "b1");
        let result = a.copy_append(&b, &CopyArgs::new()).unwrap();
        assert_eq!(result.renamed, 1);
        let names = a.user_file_names().unwrap();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("x/ma_"));
    }

    #[test]
    fn move_append_empties_source() {
        let (_fs, a, b) = pair();
        write(&b, "1", "b1");
        b.write_metadata("m", "meta").unwrap();

        let result = a.move_append(&b, &CopyArgs::new()).unwrap();
        assert!(result.moved);
        assert_eq!(result.metadata, 1);
        assert!(b.is_empty().unwrap());
        assert_eq!(sorted(&a), vec![b"b1".to_vec()]);
        assert_eq!(a.metadata("m").unwrap().as_deref(), Some("meta"));
    }

    #[test]
    fn move_append_requires_same_file_system_and_format() {
        let (_fs, a, _) = pair();
        let other: Arc<dyn FileSystem> = Arc::new(MemoryFileSystem::new());
        let remote = Store::create(Arc::clone(&other), "/r", &StoreSpec::default(), true).unwrap();
        write(&remote, "1", "r1");
        assert!(a.move_append(&remote, &CopyArgs::new()).unwrap_err().is_invalid_argument());

        // absorb falls back to a copy
        let result = a.absorb(&remote, &CopyArgs::new()).unwrap();
        assert!(!result.moved);
        assert!(!remote.is_empty().unwrap());
        assert_eq!(sorted(&a), vec![b"r1".to_vec()]);
    }

    #[test]
    fn metadata_collision_is_fatal() {
        let (_fs, a, b) = pair();
        a.write_metadata("m", "ours").unwrap();
        b.write_metadata("m", "theirs").unwrap();
        write(&b, "1", "b1");

        let err = a.copy_append(&b, &CopyArgs::new()).unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(a.is_empty().unwrap());

        a.copy_append(&b, &CopyArgs::new().copy_metadata(false)).unwrap();
        assert_eq!(a.metadata("m").unwrap().as_deref(), Some("ours"));
    }
}
