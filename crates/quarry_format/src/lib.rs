//! # Quarry Format
//!
//! Record file formats for Quarry.
//!
//! A record format turns a sequence of variable-length byte records into one
//! physical file and back. Formats are addressed by name so a store's
//! descriptor can record which format its files use; the [`FormatRegistry`]
//! resolves names to implementations.
//!
//! ## Built-in Formats
//!
//! - [`FramedFormat`] (`"framed"`) - length-prefixed frames with optional CRC-32
//!
//! ## Usage
//!
//! ```
//! use quarry_format::{create_format, FormatArgs, DEFAULT_FORMAT};
//! use quarry_storage::MemoryFileSystem;
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::new();
//! let format = create_format(DEFAULT_FORMAT, &FormatArgs::new()).unwrap();
//!
//! let mut writer = format.open_writer(&fs, Path::new("/part"), false).unwrap();
//! writer.write_record(b"first").unwrap();
//! writer.write_record(b"second").unwrap();
//! writer.close().unwrap();
//!
//! let mut reader = format.open_reader(&fs, Path::new("/part")).unwrap();
//! assert_eq!(reader.read_record().unwrap().unwrap(), b"first");
//! assert_eq!(reader.read_record().unwrap().unwrap(), b"second");
//! assert!(reader.read_record().unwrap().is_none());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod args;
mod checksum;
mod error;
mod format;
mod framed;
mod registry;

pub use args::{ArgValue, FormatArgs};
pub use checksum::compute_crc32;
pub use error::{FormatError, FormatResult};
pub use format::{read_all_records, RecordFormat, RecordReader, RecordWriter, Split};
pub use framed::{FramedFormat, FRAMED_MAGIC};
pub use registry::{create_format, register_format, FormatFactory, FormatRegistry, DEFAULT_FORMAT};
