//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header and data
//!
//! Nothing is resynchronized: a record that does not carry the expected
//! signature at the position the archive points to is an error.

use crate::error::{RecordKind, Result, ZipError};
use crate::io::ReadAt;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Typically used through [`ZipReader`](super::ZipReader) rather than
/// directly.
///
/// ## Example
///
/// ```ignore
/// let parser = ZipParser::new(reader);
/// let (eocd, entries) = parser.list_files()?;
/// for entry in &entries {
///     let compressed = parser.read_payload(entry)?;
///     // Decompress...
/// }
/// ```
#[derive(Debug)]
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    /// Create a new parser for the given reader.
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read `len` bytes at `offset`, reporting a short source as truncation
    /// of `record`.
    fn read_range(&self, offset: u64, len: usize, record: RecordKind) -> Result<Vec<u8>> {
        let available = self.size.saturating_sub(offset);
        if (len as u64) > available {
            return Err(ZipError::TruncatedData {
                record,
                needed: len as u64,
                available,
            });
        }

        let mut buf = vec![0u8; len];
        self.reader.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// The EOCD is located at the end of the ZIP file, followed only by its
    /// own comment. Because the comment length is variable, the record is
    /// found by scanning backward over at most `22 + 65535` bytes and
    /// accepting the first signature whose comment length field accounts
    /// exactly for the bytes after it.
    ///
    /// # Returns
    ///
    /// A tuple of (EOCD record, offset of EOCD in file).
    pub fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            return Err(ZipError::EocdNotFound);
        }

        // Optimization: First try the simple case where there's no comment.
        let offset = self.size - eocd_size;
        let buf = self.read_range(offset, EndOfCentralDirectory::SIZE, RecordKind::EndOfCentralDirectory)?;
        if buf[0..4] == EOCD_SIGNATURE.to_le_bytes() && buf[20..22] == [0, 0] {
            let (eocd, _) = EndOfCentralDirectory::decode(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let buf = self.read_range(search_start, search_size as usize, RecordKind::EndOfCentralDirectory)?;

        // Search backwards for EOCD signature (PK\x05\x06)
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if buf[i..i + 4] != EOCD_SIGNATURE.to_le_bytes() {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let (eocd, _) = EndOfCentralDirectory::decode(&buf[i..])?;
                return Ok((eocd, search_start + i as u64));
            }
        }

        Err(ZipError::EocdNotFound)
    }

    /// Parse exactly `total_entries` central directory records.
    ///
    /// The records must fill the `cd_size` bytes at `cd_offset` with nothing
    /// left over, and the directory must end before the EOCD record.
    pub fn read_central_directory(
        &self,
        eocd: &EndOfCentralDirectory,
        eocd_offset: u64,
    ) -> Result<Vec<ZipFileEntry>> {
        if eocd.is_zip64() {
            return Err(ZipError::UnsupportedFeature("zip64 archives"));
        }
        if eocd.is_multi_disk() {
            return Err(ZipError::UnsupportedFeature("multi-disk archives"));
        }

        let cd_offset = eocd.cd_offset as u64;
        let cd_end = cd_offset + eocd.cd_size as u64;
        if cd_end > eocd_offset {
            return Err(ZipError::DirectoryCorrupt(format!(
                "directory spans {cd_offset}..{cd_end} but the end record starts at {eocd_offset}"
            )));
        }

        // Read the entire Central Directory in one go
        let cd_data = self.read_range(cd_offset, eocd.cd_size as usize, RecordKind::CentralDirectory)?;

        let total = eocd.total_entries as usize;
        let mut entries = Vec::with_capacity(total);
        let mut pos = 0;

        for index in 0..total {
            if pos >= cd_data.len() {
                return Err(ZipError::DirectoryCorrupt(format!(
                    "end record announces {total} entries, directory holds {index}"
                )));
            }

            match ZipFileEntry::decode_central(&cd_data[pos..]) {
                Ok((entry, consumed)) => {
                    pos += consumed;
                    entries.push(entry);
                }
                Err(ZipError::MalformedSignature { found, .. }) => {
                    return Err(ZipError::DirectoryCorrupt(format!(
                        "record {index} of {total} at offset {} has signature {found:#010x}",
                        cd_offset + pos as u64
                    )));
                }
                Err(ZipError::TruncatedData { needed, available, .. }) => {
                    return Err(ZipError::DirectoryCorrupt(format!(
                        "record {index} of {total} needs {needed} bytes, {available} left in the directory"
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        if pos != cd_data.len() {
            return Err(ZipError::DirectoryCorrupt(format!(
                "{} bytes left over after {total} records",
                cd_data.len() - pos
            )));
        }

        Ok(entries)
    }

    /// List all files in the ZIP archive, in directory order.
    pub fn list_files(&self) -> Result<(EndOfCentralDirectory, Vec<ZipFileEntry>)> {
        let (eocd, eocd_offset) = self.find_eocd()?;
        let entries = self.read_central_directory(&eocd, eocd_offset)?;
        Ok((eocd, entries))
    }

    /// Read and decode the Local File Header of `entry`.
    ///
    /// # Returns
    ///
    /// The header and the byte offset where the compressed file data begins.
    pub fn read_local_header(&self, entry: &ZipFileEntry) -> Result<(LocalFileHeader, u64)> {
        let offset = entry.lfh_offset as u64;
        let prefix = self.read_range(offset, LocalFileHeader::SIZE, RecordKind::LocalFileHeader)?;
        let header_len = LocalFileHeader::encoded_len_from_prefix(&prefix)?;

        let data = self.read_range(offset, header_len, RecordKind::LocalFileHeader)?;
        let (header, consumed) = LocalFileHeader::decode(&data)?;
        Ok((header, offset + consumed as u64))
    }

    /// Read the compressed bytes of `entry`.
    ///
    /// The local header must name the same file as the directory record.
    /// Sizes come from the local header unless it defers them to a data
    /// descriptor, in which case the descriptor after the payload has to
    /// agree with the directory.
    pub fn read_payload(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let (header, data_offset) = self.read_local_header(entry)?;

        if header.file_name != entry.file_name {
            return Err(ZipError::DirectoryCorrupt(format!(
                "local header at {} is for {:?}, directory says {:?}",
                entry.lfh_offset,
                String::from_utf8_lossy(&header.file_name),
                entry.name()
            )));
        }
        if header.flags & FLAG_ENCRYPTED != 0 || entry.is_encrypted() {
            return Err(ZipError::UnsupportedFeature("encrypted entries"));
        }

        let compressed_size = if header.has_data_descriptor() {
            entry.compressed_size
        } else {
            if header.crc32 != entry.crc32
                || header.compressed_size != entry.compressed_size
                || header.uncompressed_size != entry.uncompressed_size
            {
                return Err(ZipError::DirectoryCorrupt(format!(
                    "local header of {:?} disagrees with its directory record",
                    entry.name()
                )));
            }
            header.compressed_size
        };

        let data = self.read_range(data_offset, compressed_size as usize, RecordKind::Payload)?;

        if header.has_data_descriptor() {
            let descriptor_offset = data_offset + compressed_size as u64;
            let bytes = self.read_range(descriptor_offset, DataDescriptor::SIZE, RecordKind::DataDescriptor)?;
            let (descriptor, _) = DataDescriptor::decode(&bytes)?;
            if descriptor != DataDescriptor::for_entry(entry) {
                return Err(ZipError::DirectoryCorrupt(format!(
                    "data descriptor of {:?} disagrees with its directory record",
                    entry.name()
                )));
            }
        }

        Ok(data)
    }

    /// Get a reference to the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
