//! Error types shared by the codec, the writer and the reader.

use std::fmt;
use std::io;

use thiserror::Error;

/// The binary record a codec error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    LocalFileHeader,
    DataDescriptor,
    CentralDirectory,
    EndOfCentralDirectory,
    /// The compressed bytes following a local header.
    Payload,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::LocalFileHeader => "local file header",
            RecordKind::DataDescriptor => "data descriptor",
            RecordKind::CentralDirectory => "central directory record",
            RecordKind::EndOfCentralDirectory => "end of central directory record",
            RecordKind::Payload => "entry payload",
        };
        f.write_str(name)
    }
}

/// Errors produced while encoding, writing, parsing or extracting archives.
#[derive(Debug, Error)]
pub enum ZipError {
    /// A record did not start with the magic expected at that position.
    #[error("bad signature for {record}: expected {expected:#010x}, found {found:#010x}")]
    MalformedSignature {
        record: RecordKind,
        expected: u32,
        found: u32,
    },

    /// Fewer bytes are available than a fixed layout or a length field claims.
    #[error("truncated {record}: needed {needed} bytes, only {available} available")]
    TruncatedData {
        record: RecordKind,
        needed: u64,
        available: u64,
    },

    #[error("end of central directory record not found")]
    EocdNotFound,

    /// The end record and the central directory disagree.
    #[error("corrupt central directory: {0}")]
    DirectoryCorrupt(String),

    #[error("duplicate entry name: {0}")]
    DuplicateEntryName(String),

    #[error("unsupported compression method {0}")]
    UnsupportedMethod(u16),

    #[error("checksum mismatch for {name}: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("size mismatch for {name}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("invalid entry name {name:?}: {reason}")]
    InvalidEntryName { name: String, reason: &'static str },

    #[error("{field} is {len} bytes long, the format allows at most {limit}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("archive limit exceeded: {0}")]
    LimitExceeded(&'static str),

    #[error("invalid DOS timestamp: {0}")]
    InvalidTimestamp(&'static str),

    #[error("unsupported archive feature: {0}")]
    UnsupportedFeature(&'static str),

    /// The compression provider failed on an entry.
    #[error("compression provider failed: {0}")]
    Compression(#[source] io::Error),

    #[error("archive writer is already closed")]
    WriterClosed,

    #[error("archive writer hit a fatal error and can no longer be used")]
    WriterFailed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ZipError>;

impl ZipError {
    pub(crate) fn truncated(record: RecordKind, needed: usize, available: usize) -> Self {
        ZipError::TruncatedData {
            record,
            needed: needed as u64,
            available: available as u64,
        }
    }
}
