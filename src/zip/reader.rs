use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use crate::error::{Result, ZipError};
use crate::io::{LocalFileReader, ReadAt};

use super::compression::{Compressor, DefaultCompressor};
use super::options::{DuplicateNamePolicy, ReaderOptions};
use super::parser::ZipParser;
use super::structures::{EndOfCentralDirectory, ZipFileEntry};

/// An open archive: the parsed central directory plus the source it came
/// from. Payloads are only read when an entry is opened.
#[derive(Debug)]
pub struct ZipReader<R: ReadAt, C: Compressor = DefaultCompressor> {
    parser: ZipParser<R>,
    compressor: C,
    end_record: EndOfCentralDirectory,
    entries: Vec<ZipFileEntry>,
    index: HashMap<Vec<u8>, usize>,
}

impl ZipReader<LocalFileReader> {
    /// Open the archive at `path`. The file is closed when the reader drops.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let reader = LocalFileReader::new(path.as_ref())?;
        Self::new(reader)
    }
}

impl<R: ReadAt> ZipReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        Self::with_options(reader, ReaderOptions::default())
    }

    pub fn with_options(reader: R, options: ReaderOptions) -> Result<Self> {
        Self::with_compressor(reader, options, DefaultCompressor::default())
    }
}

impl<R: ReadAt, C: Compressor> ZipReader<R, C> {
    /// Locate the end record, parse the central directory and index names.
    pub fn with_compressor(reader: R, options: ReaderOptions, compressor: C) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let (end_record, entries) = parser.list_files()?;

        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            match index.entry(entry.file_name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(position);
                }
                Entry::Occupied(first) => match options.duplicate_names {
                    DuplicateNamePolicy::Error => {
                        return Err(ZipError::DuplicateEntryName(entry.name().into_owned()));
                    }
                    DuplicateNamePolicy::Warn => {
                        log::warn!(
                            "duplicate entry {:?} at record {}, lookups use record {}",
                            entry.name(),
                            position,
                            first.get()
                        );
                    }
                },
            }
        }

        log::debug!(
            "opened archive: {} entries, central directory at {} ({} bytes)",
            entries.len(),
            end_record.cd_offset,
            end_record.cd_size
        );

        Ok(Self {
            parser,
            compressor,
            end_record,
            entries,
            index,
        })
    }

    /// All entries in central directory order.
    pub fn list_entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Iterate over the entries in central directory order.
    pub fn entries(&self) -> impl Iterator<Item = &ZipFileEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Archive comment from the end record.
    pub fn comment(&self) -> &[u8] {
        &self.end_record.comment
    }

    pub fn end_record(&self) -> &EndOfCentralDirectory {
        &self.end_record
    }

    pub fn entry_by_name(&self, name: impl AsRef<[u8]>) -> Option<&ZipFileEntry> {
        self.index
            .get(name.as_ref())
            .map(|&position| &self.entries[position])
    }

    /// Open an entry by name and return a reader over its verified contents.
    pub fn open_entry(&self, name: impl AsRef<[u8]>) -> Result<ZipEntryReader> {
        let name = name.as_ref();
        let entry = self
            .entry_by_name(name)
            .ok_or_else(|| ZipError::EntryNotFound(String::from_utf8_lossy(name).into_owned()))?;
        let data = self.extract(entry)?;
        Ok(ZipEntryReader {
            name: entry.name().into_owned(),
            data: Cursor::new(data),
        })
    }

    pub fn read_entry(&self, name: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        Ok(self.open_entry(name)?.into_bytes())
    }

    /// Extract file data to memory
    ///
    /// The decompressed bytes are only returned once their CRC-32 and length
    /// match the directory record.
    pub fn extract(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let method = entry.compression_method;
        if !self.compressor.supports(method) {
            return Err(ZipError::UnsupportedMethod(method.as_u16()));
        }

        let compressed = self.parser.read_payload(entry)?;
        let expected_size = entry.uncompressed_size as u64;
        let out = self
            .compressor
            .decompress(method, &compressed, expected_size)
            .map_err(ZipError::Compression)?;

        if out.crc32 != entry.crc32 {
            return Err(ZipError::ChecksumMismatch {
                name: entry.name().into_owned(),
                expected: entry.crc32,
                actual: out.crc32,
            });
        }
        if out.data.len() as u64 != expected_size {
            return Err(ZipError::SizeMismatch {
                name: entry.name().into_owned(),
                expected: expected_size,
                actual: out.data.len() as u64,
            });
        }

        log::trace!(
            "read {:?}: {} -> {} bytes",
            entry.name(),
            compressed.len(),
            out.data.len()
        );
        Ok(out.data)
    }

    /// Extract file to disk
    pub fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = self.extract(entry)?;
        fs::write(output_path, &data)?;
        Ok(())
    }

    /// Extract file into any writer, e.g. stdout
    pub fn extract_to_writer<W: Write>(&self, entry: &ZipFileEntry, mut writer: W) -> Result<()> {
        let data = self.extract(entry)?;
        writer.write_all(&data)?;
        Ok(())
    }

    /// Give the source back. Only needed when the caller supplied it.
    pub fn into_inner(self) -> R {
        self.parser.into_inner()
    }
}

/// The contents of one entry, already decompressed and checksum-verified.
#[derive(Debug)]
pub struct ZipEntryReader {
    name: String,
    data: Cursor<Vec<u8>>,
}

impl ZipEntryReader {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.data.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.get_ref().is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data.into_inner()
    }
}

impl Read for ZipEntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}
