//! # Quarry Core
//!
//! Partitioned record stores on hierarchical file systems.
//!
//! This crate provides:
//! - [`Store`]: a directory tree of record files governed by one descriptor
//! - [`Structure`]: pluggable partition policies, with typed routing through
//!   [`TypedStructure`] and [`TypedStore`]
//! - Write sessions that fan out lazily, one file per partition
//! - Cross-store append ([`Store::copy_append`], [`Store::move_append`],
//!   [`Store::absorb`]) with collision renaming
//! - Consolidation of small files within each partition
//!
//! ## Quick Start
//!
//! ```rust
//! use quarry_core::{CopyArgs, Store, StoreSpec};
//! use quarry_storage::MemoryFileSystem;
//! use std::sync::Arc;
//!
//! let fs = Arc::new(MemoryFileSystem::new());
//! let main = Store::create(fs.clone(), "/main", &StoreSpec::default(), true)?;
//! let batch = Store::create(fs, "/batch", &StoreSpec::default(), true)?;
//!
//! let mut session = batch.open_write("2024/part-0", false)?;
//! session.write(b"event")?;
//! session.close()?;
//!
//! main.absorb(&batch, &CopyArgs::default())?;
//! assert!(batch.is_empty()?);
//! assert!(!main.is_empty()?);
//! # Ok::<(), quarry_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod append;
mod codec;
mod config;
mod consolidate;
mod error;
mod iter;
mod paths;
mod session;
mod spec;
mod store;
mod structure;
mod transfer;
mod typed;

pub use append::{AppendResult, CopyArgs, RenameMode, RENAME_PREFIX};
pub use codec::{BytesCodec, CborCodec, RecordCodec, TextCodec};
pub use config::{Config, DEFAULT_CONSOLIDATION_SIZE};
pub use consolidate::ConsolidationResult;
pub use error::{CoreError, CoreResult};
pub use iter::{collect_records, Records, TypedRecords};
pub use paths::{EXTENSION, META_EXTENSION, RESERVED_PREFIX};
pub use session::{TypedWriteSession, WriteSession};
pub use spec::{StoreSpec, DESCRIPTOR_NAME};
pub use store::Store;
pub use structure::{
    register_structure, DefaultStructure, RecordType, Structure, StructureRegistry,
    TextStructure, TypedStructure, DEFAULT_STRUCTURE,
};
pub use transfer::{
    BulkCopier, FileTransfer, RecordTranscoder, SequentialCopier, Transcoder, TransferKind,
};
pub use typed::TypedStore;
