//! The time slice store.

use crate::slice::Slice;
use crate::structure::{parse_canonical, register_time_slice_structures, TimeSliceStructure};
use quarry_core::{
    AppendResult, Config, ConsolidationResult, CopyArgs, CoreError, CoreResult, RecordCodec,
    Store, StoreSpec, TypedRecords, TypedStore, WriteSession,
};
use quarry_storage::FileSystem;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Value written into a slice's completion marker.
const FINISHED_MARKER: &str = "slice";

/// A store partitioned by week and slice, with slices finalized in order.
///
/// Each slice lives at `<week>/<slice>/` below the store root. A slice is
/// *unfinished* while it only has data files and *finished* once its
/// completion marker (the metadata file `<week>/<slice>`) exists. Finishing
/// is one-way.
///
/// New slices must start after every finished slice in the store, across
/// all weeks.
pub struct TimeSliceStore<C: RecordCodec> {
    store: TypedStore<TimeSliceStructure<C>>,
}

impl<C: RecordCodec> Clone for TimeSliceStore<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<C: RecordCodec> TimeSliceStore<C> {
    /// Creates a time slice store with the default format.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `path` lies below the root
    /// of an existing store, and otherwise fails like
    /// [`Store::create`].
    pub fn create(fs: Arc<dyn FileSystem>, path: impl AsRef<Path>, fail_on_exists: bool) -> CoreResult<Self> {
        Self::create_with_spec(fs, path, &StoreSpec::default(), fail_on_exists, Config::default())
    }

    /// Creates a time slice store with an explicit format and configuration.
    /// The spec's structure is replaced with the time slice structure.
    ///
    /// # Errors
    ///
    /// See [`TimeSliceStore::create`].
    pub fn create_with_spec(
        fs: Arc<dyn FileSystem>,
        path: impl AsRef<Path>,
        spec: &StoreSpec,
        fail_on_exists: bool,
        config: Config,
    ) -> CoreResult<Self> {
        register_time_slice_structures();
        let store = TypedStore::create_with_spec(
            fs,
            path,
            TimeSliceStructure::default(),
            spec,
            fail_on_exists,
            config,
        )?;
        Self::from_store(store)
    }

    /// Opens an existing time slice store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if `path` is not the root of a
    /// time slice store with this codec.
    pub fn open(fs: Arc<dyn FileSystem>, path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with(fs, path, Config::default())
    }

    /// Opens an existing time slice store with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`TimeSliceStore::open`].
    pub fn open_with(fs: Arc<dyn FileSystem>, path: impl AsRef<Path>, config: Config) -> CoreResult<Self> {
        register_time_slice_structures();
        Self::from_store(TypedStore::open_with(fs, path, TimeSliceStructure::default(), config)?)
    }

    fn from_store(store: TypedStore<TimeSliceStructure<C>>) -> CoreResult<Self> {
        if !store.at_root() {
            return Err(CoreError::invalid_argument(format!(
                "a time slice store must sit at its store root, not below {}",
                store.root().display()
            )));
        }
        Ok(Self { store })
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.store.root()
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        self.store.store()
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Returns the week starts that have a directory, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be listed.
    pub fn week_starts(&self) -> CoreResult<Vec<i64>> {
        Ok(parse_sorted(self.store.attrs_at("")?))
    }

    /// Returns the finished slice starts of `week`, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the week cannot be listed.
    pub fn slice_starts(&self, week: i64) -> CoreResult<Vec<i64>> {
        Ok(parse_sorted(self.store.metadata_file_names_at(&week.to_string())?))
    }

    /// Returns the smallest finished slice start of `week`.
    ///
    /// # Errors
    ///
    /// Returns an error if the week cannot be listed.
    pub fn min_slice_start_in(&self, week: i64) -> CoreResult<Option<i64>> {
        Ok(self.slice_starts(week)?.first().copied())
    }

    /// Returns the largest finished slice start of `week`.
    ///
    /// # Errors
    ///
    /// Returns an error if the week cannot be listed.
    pub fn max_slice_start_in(&self, week: i64) -> CoreResult<Option<i64>> {
        Ok(self.slice_starts(week)?.last().copied())
    }

    /// Returns the largest finished slice start in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn max_slice_start(&self) -> CoreResult<Option<i64>> {
        for week in self.week_starts()?.into_iter().rev() {
            if let Some(max) = self.max_slice_start_in(week)? {
                return Ok(Some(max));
            }
        }
        Ok(None)
    }

    /// Returns the smallest finished slice start in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn min_slice_start(&self) -> CoreResult<Option<i64>> {
        for week in self.week_starts()? {
            if let Some(min) = self.min_slice_start_in(week)? {
                return Ok(Some(min));
            }
        }
        Ok(None)
    }

    /// Returns the largest week holding a finished slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn max_week_start(&self) -> CoreResult<Option<i64>> {
        for week in self.week_starts()?.into_iter().rev() {
            if !self.slice_starts(week)?.is_empty() {
                return Ok(Some(week));
            }
        }
        Ok(None)
    }

    /// Returns the smallest week holding a finished slice.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn min_week_start(&self) -> CoreResult<Option<i64>> {
        for week in self.week_starts()? {
            if !self.slice_starts(week)?.is_empty() {
                return Ok(Some(week));
            }
        }
        Ok(None)
    }

    /// Returns true once `slice` has been finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker cannot be read.
    pub fn is_slice_finished(&self, slice: Slice) -> CoreResult<bool> {
        Ok(self.store.metadata(&slice.path())?.is_some())
    }

    /// Returns every slice with a directory but no completion marker.
    /// Directories whose names are not integers are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn unfinished_slices(&self) -> CoreResult<Vec<Slice>> {
        let mut unfinished = Vec::new();
        for week in self.week_starts()? {
            let finished: BTreeSet<i64> = self.slice_starts(week)?.into_iter().collect();
            for candidate in parse_sorted(self.store.attrs_at(&week.to_string())?) {
                if !finished.contains(&candidate) {
                    unfinished.push(Slice::new(week, candidate));
                }
            }
        }
        Ok(unfinished)
    }

    // ---------------------------------------------------------------------
    // Writing and reading
    // ---------------------------------------------------------------------

    fn validate(&self, slice: Slice) -> CoreResult<()> {
        let week = slice.week_start.to_string();
        let start = slice.slice_start.to_string();
        if self.store.structure().is_valid_target(&[week.as_str(), start.as_str()]) {
            Ok(())
        } else {
            Err(CoreError::invalid_argument(format!("{slice} is not a valid slice")))
        }
    }

    /// Opens a session writing into `slice`, under a fresh UUID file name so
    /// concurrent writers never share a file.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the slice does not start
    /// after every finished slice or is not a valid slice.
    pub fn open_write(&self, slice: Slice) -> CoreResult<SliceWriteSession<C>> {
        if let Some(max) = self.max_slice_start()? {
            if slice.slice_start <= max {
                return Err(CoreError::invalid_argument(format!(
                    "cannot write to {slice}: slice {max} is already finished"
                )));
            }
        }
        self.validate(slice)?;
        let name = format!("{}/{}", slice.path(), Uuid::new_v4());
        Ok(SliceWriteSession {
            inner: self.store.store().open_write(&name, false)?,
            structure: Arc::clone(self.store.typed_structure()),
        })
    }

    /// Marks `slice` as finished. Finishing an empty slice is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the slice is not valid.
    pub fn finish_slice(&self, slice: Slice) -> CoreResult<()> {
        self.validate(slice)?;
        let path = slice.path();
        self.store.mk_attr(&path)?;
        self.store.write_metadata(&path, FINISHED_MARKER)
    }

    /// Reads every record of a finished slice.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the slice is not finished.
    pub fn open_read(&self, slice: Slice) -> CoreResult<TypedRecords<TimeSliceStructure<C>>> {
        if !self.is_slice_finished(slice)? {
            return Err(CoreError::invalid_argument(format!(
                "cannot read from unfinished slice {slice}"
            )));
        }
        self.store.sub_store(&slice.path())?.iter()
    }

    // ---------------------------------------------------------------------
    // Append and consolidation
    // ---------------------------------------------------------------------

    /// Copies every slice of `other` into this store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] unless every finished slice of
    /// `other` starts after every finished slice of this store.
    pub fn copy_append(&self, other: &TimeSliceStore<C>) -> CoreResult<AppendResult> {
        self.append(other, Store::copy_append)
    }

    /// Moves every slice of `other` into this store.
    ///
    /// # Errors
    ///
    /// See [`TimeSliceStore::copy_append`] and [`Store::move_append`].
    pub fn move_append(&self, other: &TimeSliceStore<C>) -> CoreResult<AppendResult> {
        self.append(other, Store::move_append)
    }

    /// Moves or copies every slice of `other` into this store.
    ///
    /// # Errors
    ///
    /// See [`TimeSliceStore::copy_append`].
    pub fn absorb(&self, other: &TimeSliceStore<C>) -> CoreResult<AppendResult> {
        self.append(other, Store::absorb)
    }

    fn append(
        &self,
        other: &TimeSliceStore<C>,
        op: fn(&Store, &Store, &CopyArgs) -> CoreResult<AppendResult>,
    ) -> CoreResult<AppendResult> {
        if let (Some(mine), Some(theirs)) = (self.max_slice_start()?, other.min_slice_start()?) {
            if theirs <= mine {
                return Err(CoreError::invalid_argument(format!(
                    "cannot append {} to {}: its first slice {theirs} does not follow {mine}",
                    other.root().display(),
                    self.root().display()
                )));
            }
        }

        let mut finished = Vec::new();
        for week in other.week_starts()? {
            for start in other.slice_starts(week)? {
                finished.push(Slice::new(week, start));
            }
        }

        let result = op(self.store(), other.store(), &CopyArgs::new().copy_metadata(false))?;
        for slice in &finished {
            self.finish_slice(*slice)?;
        }
        info!(
            source = %other.root().display(),
            dest = %self.root().display(),
            slices = finished.len(),
            files = result.files,
            "appended time slice store"
        );
        Ok(result)
    }

    /// Consolidates every slice. Must not run alongside readers or writers.
    ///
    /// # Errors
    ///
    /// See [`Store::consolidate`].
    pub fn consolidate(&self) -> CoreResult<ConsolidationResult> {
        self.store.consolidate()
    }

    /// Consolidates one slice.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] for invalid slices, otherwise
    /// see [`Store::consolidate`].
    pub fn consolidate_slice(&self, slice: Slice) -> CoreResult<ConsolidationResult> {
        self.validate(slice)?;
        self.store.store().sub_store(&slice.path())?.consolidate()
    }
}

impl<C: RecordCodec> fmt::Debug for TimeSliceStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSliceStore")
            .field("root", &self.root())
            .field("structure", &self.store.structure().identity())
            .finish()
    }
}

/// A session writing typed records into one slice.
pub struct SliceWriteSession<C: RecordCodec> {
    inner: WriteSession,
    structure: Arc<TimeSliceStructure<C>>,
}

impl<C: RecordCodec> SliceWriteSession<C> {
    /// Writes one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or written.
    pub fn write(&mut self, record: &C::Record) -> CoreResult<()> {
        let bytes = self.structure.codec().encode(record)?;
        self.inner.write(&bytes)
    }

    /// Returns the number of records written so far.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.inner.records_written()
    }

    /// Closes the session, publishing its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be published.
    pub fn close(self) -> CoreResult<()> {
        self.inner.close()
    }
}

impl<C: RecordCodec> fmt::Debug for SliceWriteSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceWriteSession")
            .field("inner", &self.inner)
            .finish()
    }
}

fn parse_sorted(names: Vec<String>) -> Vec<i64> {
    let mut values: Vec<i64> = names.iter().filter_map(|n| parse_canonical(n)).collect();
    values.sort_unstable();
    values
}
