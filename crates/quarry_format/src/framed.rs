//! Length-prefixed framed record format.
//!
//! ## File Layout
//!
//! ```text
//! +-------------+-----------+
//! | magic (4)   | flags (1) |        header
//! +-------------+-----------+------------------+
//! | len (4, LE) | payload   | crc32 (4, LE)?   |  one frame per record
//! +-------------+-----------+------------------+
//! ```
//!
//! The CRC is present on every frame when the header's checksum flag is set.
//! Readers take the flag from the file itself, so files written with and
//! without checksums can be mixed under one format instance. A zero-length
//! file is a valid file holding no records.

use crate::args::{ArgValue, FormatArgs};
use crate::checksum::compute_crc32;
use crate::error::{FormatError, FormatResult};
use crate::format::{RecordFormat, RecordReader, RecordWriter, Split};
use quarry_storage::{FileSystem, FileWriter};
use std::io::{self, Read, Write};
use std::path::Path;

/// Magic bytes identifying a framed record file.
pub const FRAMED_MAGIC: [u8; 4] = *b"QRF1";

/// Header size: magic (4) + flags (1).
const HEADER_SIZE: usize = 5;

/// Length prefix size.
const LEN_SIZE: u64 = 4;

/// Checksum size.
const CRC_SIZE: u64 = 4;

const FLAG_CHECKSUM: u8 = 0x01;

const ARG_CHECKSUM: &str = "checksum";

/// The built-in `"framed"` record format.
///
/// Accepts one argument, `checksum` (bool, default `true`), controlling
/// whether newly written frames carry a CRC-32 of their payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedFormat {
    checksum: bool,
    args: FormatArgs,
}

impl Default for FramedFormat {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FramedFormat {
    /// Name the format is registered under.
    pub const NAME: &'static str = "framed";

    /// Creates a framed format.
    #[must_use]
    pub fn new(checksum: bool) -> Self {
        let mut args = FormatArgs::new();
        args.insert(ARG_CHECKSUM.to_string(), ArgValue::Bool(checksum));
        Self { checksum, args }
    }

    /// Creates a framed format from descriptor arguments.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::InvalidArgs`] for unknown keys or a
    /// non-boolean `checksum`.
    pub fn from_args(args: &FormatArgs) -> FormatResult<Self> {
        let mut checksum = true;
        for (key, value) in args {
            match (key.as_str(), value) {
                (ARG_CHECKSUM, ArgValue::Bool(b)) => checksum = *b,
                (ARG_CHECKSUM, other) => {
                    return Err(FormatError::invalid_args(format!(
                        "'{ARG_CHECKSUM}' must be a boolean, got {other}"
                    )));
                }
                (unknown, _) => {
                    return Err(FormatError::invalid_args(format!(
                        "unknown argument '{unknown}' for format '{}'",
                        Self::NAME
                    )));
                }
            }
        }
        Ok(Self::new(checksum))
    }

    /// Returns whether new frames carry a checksum.
    #[must_use]
    pub fn checksum(&self) -> bool {
        self.checksum
    }
}

/// Reads until `buf` is full or EOF, returning the number of bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Parses the header. Returns `None` for an empty file, else the checksum flag.
fn read_header<R: Read + ?Sized>(reader: &mut R, path: &Path) -> FormatResult<Option<bool>> {
    let mut header = [0u8; HEADER_SIZE];
    match read_full(reader, &mut header)? {
        0 => Ok(None),
        HEADER_SIZE => {
            if header[..4] != FRAMED_MAGIC {
                return Err(FormatError::corrupted(format!(
                    "bad magic in {}",
                    path.display()
                )));
            }
            Ok(Some(header[4] & FLAG_CHECKSUM != 0))
        }
        n => Err(FormatError::corrupted(format!(
            "truncated header in {} ({n} bytes)",
            path.display()
        ))),
    }
}

/// Reads a little-endian length prefix. `None` at a clean end of file.
fn read_len<R: Read + ?Sized>(reader: &mut R) -> FormatResult<Option<u32>> {
    let mut buf = [0u8; LEN_SIZE as usize];
    match read_full(reader, &mut buf)? {
        0 => Ok(None),
        4 => Ok(Some(u32::from_le_bytes(buf))),
        _ => Err(FormatError::corrupted("truncated length prefix")),
    }
}

struct FramedWriter {
    file: Box<dyn FileWriter>,
    checksum: bool,
}

impl RecordWriter for FramedWriter {
    fn write_record(&mut self, record: &[u8]) -> FormatResult<()> {
        let len = u32::try_from(record.len())
            .map_err(|_| FormatError::RecordTooLarge { len: record.len() })?;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(record)?;
        if self.checksum {
            self.file.write_all(&compute_crc32(record).to_le_bytes())?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> FormatResult<()> {
        self.file.commit()?;
        Ok(())
    }
}

struct FramedReader {
    input: Box<dyn Read + Send>,
    checksum: bool,
    finished: bool,
}

impl RecordReader for FramedReader {
    fn read_record(&mut self) -> FormatResult<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }
        let Some(len) = read_len(self.input.as_mut())? else {
            self.finished = true;
            return Ok(None);
        };

        let mut payload = vec![0u8; len as usize];
        if read_full(self.input.as_mut(), &mut payload)? != payload.len() {
            self.finished = true;
            return Err(FormatError::corrupted("truncated record payload"));
        }

        if self.checksum {
            let mut crc = [0u8; CRC_SIZE as usize];
            if read_full(self.input.as_mut(), &mut crc)? != crc.len() {
                self.finished = true;
                return Err(FormatError::corrupted("truncated record checksum"));
            }
            let expected = u32::from_le_bytes(crc);
            let actual = compute_crc32(&payload);
            if expected != actual {
                self.finished = true;
                return Err(FormatError::ChecksumMismatch { expected, actual });
            }
        }
        Ok(Some(payload))
    }
}

impl RecordFormat for FramedFormat {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn args(&self) -> &FormatArgs {
        &self.args
    }

    fn open_writer(
        &self,
        fs: &dyn FileSystem,
        path: &Path,
        overwrite: bool,
    ) -> FormatResult<Box<dyn RecordWriter>> {
        let mut file = fs.create(path, overwrite)?;
        file.write_all(&FRAMED_MAGIC)?;
        file.write_all(&[if self.checksum { FLAG_CHECKSUM } else { 0 }])?;
        Ok(Box::new(FramedWriter {
            file,
            checksum: self.checksum,
        }))
    }

    fn open_reader(&self, fs: &dyn FileSystem, path: &Path) -> FormatResult<Box<dyn RecordReader>> {
        let mut input = fs.open(path)?;
        let header = read_header(input.as_mut(), path)?;
        Ok(Box::new(FramedReader {
            input,
            checksum: header.unwrap_or(false),
            finished: header.is_none(),
        }))
    }

    fn splits(&self, fs: &dyn FileSystem, path: &Path, target_len: u64) -> FormatResult<Vec<Split>> {
        let mut input = fs.open(path)?;
        let Some(checksum) = read_header(input.as_mut(), path)? else {
            return Ok(Vec::new());
        };
        let target_len = target_len.max(1);
        let trailer = if checksum { CRC_SIZE } else { 0 };

        let mut splits = Vec::new();
        let mut offset = HEADER_SIZE as u64;
        let mut current = Split {
            start: offset,
            len: 0,
        };
        while let Some(len) = read_len(input.as_mut())? {
            let body = u64::from(len) + trailer;
            let skipped = io::copy(&mut input.by_ref().take(body), &mut io::sink())?;
            if skipped != body {
                return Err(FormatError::corrupted(format!(
                    "truncated frame at offset {offset} in {}",
                    path.display()
                )));
            }
            let frame = LEN_SIZE + body;
            offset += frame;
            current.len += frame;
            if current.len >= target_len {
                splits.push(current);
                current = Split {
                    start: offset,
                    len: 0,
                };
            }
        }
        if current.len > 0 {
            splits.push(current);
        }
        Ok(splits)
    }
}
