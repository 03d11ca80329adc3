//! # Quarry Time Slices
//!
//! Record stores partitioned by week and slice.
//!
//! A [`TimeSliceStore`] keeps each slice under `<week>/<slice>/`, where both
//! names are seconds since the epoch and the week is the epoch-aligned week
//! containing the slice. Writers add files to open slices; once a slice is
//! finished it becomes readable and no slice at or before it may be written
//! again.
//!
//! ```rust
//! use quarry_core::{collect_records, TextCodec};
//! use quarry_storage::MemoryFileSystem;
//! use quarry_timeslice::{Slice, TimeSliceStore};
//! use std::sync::Arc;
//!
//! let fs = Arc::new(MemoryFileSystem::new());
//! let store = TimeSliceStore::<TextCodec>::create(fs, "/events", true)?;
//!
//! let slice = Slice::at(1_700_000_000);
//! let mut session = store.open_write(slice)?;
//! session.write(&"login".to_string())?;
//! session.close()?;
//! store.finish_slice(slice)?;
//!
//! let records = collect_records(store.open_read(slice)?)?;
//! assert_eq!(records, vec!["login".to_string()]);
//! assert_eq!(store.max_slice_start()?, Some(1_700_000_000));
//! # Ok::<(), quarry_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod slice;
mod store;
mod structure;

pub use slice::{week_start, Slice, SECONDS_PER_WEEK};
pub use store::{SliceWriteSession, TimeSliceStore};
pub use structure::{register_time_slice_structures, TimeSliceStructure, TIME_SLICE_IDENTITY};
