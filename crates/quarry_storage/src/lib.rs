//! # Quarry Storage
//!
//! Hierarchical file system abstraction for Quarry.
//!
//! This crate provides the lowest-level storage layer. A file system is a
//! namespace of directories and **opaque byte files**; it knows nothing about
//! record formats, store descriptors, or partition structures.
//!
//! ## Design Principles
//!
//! - File creation is atomic: a file becomes visible only when its writer commits
//! - Rename is atomic and never overwrites an existing target
//! - Listings are point-in-time snapshots, sorted by name
//! - Must be `Send + Sync` for concurrent access
//!
//! ## Available File Systems
//!
//! - [`MemoryFileSystem`] - For testing and ephemeral stores
//! - [`LocalFileSystem`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use quarry_storage::{FileSystem, MemoryFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::new();
//! fs.write_all(Path::new("/data/hello.txt"), b"hello world", false).unwrap();
//! assert_eq!(fs.read_all(Path::new("/data/hello.txt")).unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod filesystem;
mod local;
mod memory;

pub use error::{StorageError, StorageResult};
pub use filesystem::{FileStatus, FileSystem, FileWriter};
pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;
