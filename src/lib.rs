//! # pkzip
//!
//! A ZIP archive codec: a writer that lays out local headers, payloads and
//! the central directory, and a reader that finds the end record, parses the
//! directory and extracts any entry by name.
//!
//! ## Features
//!
//! - Write archives into any `std::io::Write` sink, buffered or streamed
//!   (sizes unknown up front, recorded in data descriptors)
//! - Read archives from files, memory or any `Read + Seek` source
//! - STORED and DEFLATE through a pluggable [`Compressor`]
//! - CRC-32 verification of every extracted entry
//!
//! ## Example
//!
//! ```
//! use pkzip::{CompressionMethod, create_archive, open_archive};
//!
//! # fn main() -> pkzip::Result<()> {
//! let mut writer = create_archive(Vec::new());
//! writer.add_entry("hello.txt", CompressionMethod::Stored, b"hi")?;
//! writer.add_entry("dir/world.txt", CompressionMethod::Deflated, b"world world world")?;
//! let archive = writer.finish()?;
//!
//! let reader = open_archive(archive)?;
//! for entry in reader.list_entries() {
//!     println!("{}", entry.name());
//! }
//! assert_eq!(reader.read_entry("hello.txt")?, b"hi");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

use std::io::Write;

pub use cli::Cli;
pub use error::{RecordKind, Result, ZipError};
pub use io::{CountingWriter, LocalFileReader, ReadAt, SeekReader};
pub use zip::*;

/// Start a new archive in `sink`.
pub fn create_archive<W: Write>(sink: W) -> ZipWriter<W> {
    ZipWriter::new(sink)
}

/// Open the archive held by `source`.
pub fn open_archive<R: ReadAt>(source: R) -> Result<ZipReader<R>> {
    ZipReader::new(source)
}
