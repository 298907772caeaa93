//! Knobs for writing and reading archives.

use crate::error::{Result, ZipError};

use super::compression::DefaultCompressor;
use super::datetime::DosDateTime;
use super::structures::{CompressionMethod, MAX_FIELD_LEN};

/// Archive-wide settings for [`ZipWriter`](super::ZipWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// Archive comment stored in the end record. Only set through
    /// [`WriterOptions::with_comment`], which checks its length.
    pub(crate) comment: Vec<u8>,
    /// Timestamp used by entries that do not set their own.
    pub default_modified: DosDateTime,
    /// DEFLATE level (0-9) for the default compressor.
    pub compression_level: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            comment: Vec::new(),
            default_modified: DosDateTime::EPOCH,
            compression_level: DefaultCompressor::DEFAULT_LEVEL,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the archive comment. Fails with [`ZipError::FieldTooLong`] past
    /// 65535 bytes.
    pub fn with_comment(mut self, comment: impl Into<Vec<u8>>) -> Result<Self> {
        let comment = comment.into();
        check_archive_comment(&comment)?;
        self.comment = comment;
        Ok(self)
    }

    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn with_modified(mut self, modified: DosDateTime) -> Self {
        self.default_modified = modified;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

pub(crate) fn check_archive_comment(comment: &[u8]) -> Result<()> {
    if comment.len() > MAX_FIELD_LEN {
        return Err(ZipError::FieldTooLong {
            field: "archive comment",
            len: comment.len(),
            limit: MAX_FIELD_LEN,
        });
    }
    Ok(())
}

/// Per-entry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOptions {
    pub method: CompressionMethod,
    /// Falls back to [`WriterOptions::default_modified`] when `None`.
    pub modified: Option<DosDateTime>,
    pub extra_field: Vec<u8>,
    pub comment: Vec<u8>,
}

impl EntryOptions {
    pub fn new(method: CompressionMethod) -> Self {
        Self {
            method,
            modified: None,
            extra_field: Vec::new(),
            comment: Vec::new(),
        }
    }

    pub fn modified(mut self, modified: DosDateTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn extra_field(mut self, extra_field: impl Into<Vec<u8>>) -> Self {
        self.extra_field = extra_field.into();
        self
    }

    pub fn comment(mut self, comment: impl Into<Vec<u8>>) -> Self {
        self.comment = comment.into();
        self
    }
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self::new(CompressionMethod::Deflated)
    }
}

/// What the reader does when two central directory records share a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateNamePolicy {
    /// Refuse to open the archive.
    #[default]
    Error,
    /// Log a warning; name lookups resolve to the first record.
    Warn,
}

/// Settings for [`ZipReader`](super::ZipReader).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    pub duplicate_names: DuplicateNamePolicy,
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicate_names(mut self, policy: DuplicateNamePolicy) -> Self {
        self.duplicate_names = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_comment_length_is_checked_up_front() {
        let options = WriterOptions::new().with_comment("short").unwrap();
        assert_eq!(options.comment(), b"short");

        let exact = WriterOptions::new().with_comment(vec![b'c'; MAX_FIELD_LEN]).unwrap();
        assert_eq!(exact.comment().len(), MAX_FIELD_LEN);

        match WriterOptions::new().with_comment(vec![b'c'; MAX_FIELD_LEN + 1]) {
            Err(ZipError::FieldTooLong { field, len, limit }) => {
                assert_eq!(field, "archive comment");
                assert_eq!(len, MAX_FIELD_LEN + 1);
                assert_eq!(limit, MAX_FIELD_LEN);
            }
            other => panic!("expected FieldTooLong, got {other:?}"),
        }
    }

    #[test]
    fn compression_level_is_clamped() {
        assert_eq!(WriterOptions::new().with_compression_level(42).compression_level, 9);
        assert_eq!(EntryOptions::default().method, CompressionMethod::Deflated);
    }
}
