//! ZIP archive writing and reading.
//!
//! ## Architecture
//!
//! - [`structures`]: binary layouts of the four record types (local header,
//!   data descriptor, central directory record, end record)
//! - [`datetime`]: MS-DOS date/time packing
//! - [`compression`]: the pluggable [`Compressor`] and its STORED/DEFLATE
//!   default
//! - [`writer`]: [`ZipWriter`], which lays out entries and emits the
//!   central directory on close
//! - [`parser`]: low-level parsing of the end record, the central directory
//!   and local headers
//! - [`reader`]: [`ZipReader`], the open archive handle
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file, each optionally
//!    followed by a data descriptor
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No ZIP64; entries, offsets and the directory must stay below 4 GiB

pub mod compression;
pub mod datetime;
pub mod options;
pub mod parser;
pub mod reader;
pub mod structures;
pub mod writer;

pub use compression::{Compressed, Compressor, Decompressed, DefaultCompressor, StreamSummary};
pub use datetime::{DateTimeParts, DosDateTime, pack_dos_datetime, unpack_dos_datetime};
pub use options::{DuplicateNamePolicy, EntryOptions, ReaderOptions, WriterOptions};
pub use parser::ZipParser;
pub use reader::{ZipEntryReader, ZipReader};
pub use structures::*;
pub use writer::{EntryState, WriterState, ZipWriter};
