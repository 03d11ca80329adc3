//! Slices and week arithmetic.

use std::fmt;

/// Seconds in one week.
pub const SECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60;

/// Returns the start of the week containing `secs`, in seconds since the
/// epoch. Weeks are aligned to the epoch.
#[must_use]
pub const fn week_start(secs: i64) -> i64 {
    secs.div_euclid(SECONDS_PER_WEEK) * SECONDS_PER_WEEK
}

/// A time partition: a slice start inside a week.
///
/// A slice is valid when `week_start == week_start(slice_start)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slice {
    /// Start of the week, in seconds.
    pub week_start: i64,
    /// Start of the slice, in seconds.
    pub slice_start: i64,
}

impl Slice {
    /// Creates a slice from explicit week and slice starts.
    #[must_use]
    pub const fn new(week_start: i64, slice_start: i64) -> Self {
        Self {
            week_start,
            slice_start,
        }
    }

    /// Creates the slice starting at `slice_start` in the week containing it.
    #[must_use]
    pub const fn at(slice_start: i64) -> Self {
        Self::new(week_start(slice_start), slice_start)
    }

    /// Returns true if the week start matches the slice start.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.week_start == week_start(self.slice_start)
    }

    /// Returns the slice's logical path, `"<week>/<slice>"`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}/{}", self.week_start, self.slice_start)
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.week_start, self.slice_start)
    }
}
