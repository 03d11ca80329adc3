//! # Quarry Testkit
//!
//! Test utilities for Quarry.
//!
//! This crate provides:
//! - Test fixtures and store helpers
//! - Partition structures for typed store tests
//! - A file system with eventually consistent listings
//! - Property-based test generators using proptest
//!
//! The integration suites for the workspace live in this crate's `tests/`
//! directory.
//!
//! ## Usage
//!
//! ```rust
//! use quarry_testkit::prelude::*;
//!
//! with_temp_store(|store| {
//!     write_file(store, "a/part", &[b"one", b"two"]);
//!     assert_eq!(all_records(store).len(), 2);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod flaky;
pub mod generators;
pub mod structures;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::flaky::*;
    pub use crate::generators::*;
    pub use crate::structures::*;
}

pub use fixtures::*;
pub use flaky::*;
pub use generators::*;
pub use structures::*;
