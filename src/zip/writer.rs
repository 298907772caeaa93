//! Archive writer.
//!
//! Entries are written front to back as they are added: local header, then
//! payload, then (in streaming mode) a data descriptor. Each entry's central
//! directory record is staged in memory, because it needs the final offset
//! and sizes, and the whole directory plus the end record are emitted by
//! [`ZipWriter::close`].

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, ZipError};
use crate::io::CountingWriter;

use super::compression::{Compressor, DefaultCompressor};
use super::options::{EntryOptions, WriterOptions, check_archive_comment};
use super::structures::*;

/// Archive-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting entries.
    Open,
    /// Directory and end record written; nothing more is accepted.
    Closed,
    /// The sink holds a partial entry or directory. The output is unusable.
    Failed,
}

/// Progress of the entry currently being added.
///
/// Each add starts at `Idle` and moves forward one step per record written.
/// A failed add leaves the state where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryState {
    Idle,
    HeaderWritten,
    PayloadWritten,
    DirectoryRecordStaged,
}

/// Writes a ZIP archive into a sink.
///
/// ```
/// use pkzip::{CompressionMethod, ZipWriter};
///
/// let mut writer = ZipWriter::new(Vec::new());
/// writer.add_entry("hello.txt", CompressionMethod::Stored, b"hi")?;
/// let archive = writer.finish()?;
/// assert_eq!(&archive[..4], b"PK\x03\x04");
/// # Ok::<(), pkzip::ZipError>(())
/// ```
#[derive(Debug)]
pub struct ZipWriter<W: Write, C: Compressor = DefaultCompressor> {
    sink: CountingWriter<W>,
    compressor: C,
    options: WriterOptions,
    entries: Vec<ZipFileEntry>,
    names: HashSet<Vec<u8>>,
    state: WriterState,
    entry_state: EntryState,
}

impl ZipWriter<BufWriter<File>> {
    /// Create (or truncate) the file at `path` and write an archive into it.
    /// The file is closed when the writer drops.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ZipWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: W, options: WriterOptions) -> Self {
        let compressor = DefaultCompressor::new(options.compression_level);
        Self::with_compressor(sink, options, compressor)
    }
}

impl<W: Write, C: Compressor> ZipWriter<W, C> {
    pub fn with_compressor(sink: W, options: WriterOptions, compressor: C) -> Self {
        Self {
            sink: CountingWriter::new(sink),
            compressor,
            options,
            entries: Vec::new(),
            names: HashSet::new(),
            state: WriterState::Open,
            entry_state: EntryState::Idle,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// How far the most recent add got.
    pub fn entry_state(&self) -> EntryState {
        self.entry_state
    }

    /// Bytes written so far, i.e. the offset the next record will land at.
    pub fn position(&self) -> u64 {
        self.sink.position()
    }

    /// Directory records staged so far, in addition order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn get_ref(&self) -> &W {
        self.sink.get_ref()
    }

    /// Set the archive comment written into the end record.
    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) -> Result<()> {
        self.ensure_open()?;
        let comment = comment.into();
        check_archive_comment(&comment)?;
        self.options.comment = comment;
        Ok(())
    }

    /// Compress `payload` with `method` and append it as `name`.
    pub fn add_entry(
        &mut self,
        name: impl AsRef<[u8]>,
        method: CompressionMethod,
        payload: &[u8],
    ) -> Result<()> {
        self.add_entry_with_options(name, payload, EntryOptions::new(method))
    }

    pub fn add_entry_with_options(
        &mut self,
        name: impl AsRef<[u8]>,
        payload: &[u8],
        options: EntryOptions,
    ) -> Result<()> {
        self.ensure_open()?;
        self.entry_state = EntryState::Idle;
        let mut entry = self.prepare_entry(name.as_ref(), &options, false)?;

        // nothing has reached the sink yet, so a failure here leaves the
        // writer open
        let compressed = self
            .compressor
            .compress(options.method, payload)
            .map_err(ZipError::Compression)?;
        entry.crc32 = compressed.crc32;
        entry.compressed_size = entry_size(compressed.compressed_size)?;
        entry.uncompressed_size = entry_size(compressed.uncompressed_size)?;

        let header = LocalFileHeader::for_entry(&entry).encode()?;
        let end = self.position() + header.len() as u64 + compressed.data.len() as u64;
        if offset_u32(end).is_none() {
            return Err(ZipError::LimitExceeded("archive larger than 4 GiB"));
        }

        self.emit(&header)?;
        self.advance(EntryState::HeaderWritten);
        self.emit(&compressed.data)?;
        self.advance(EntryState::PayloadWritten);
        self.stage(entry);
        Ok(())
    }

    /// Stream `source` into the archive as `name` without knowing its size
    /// up front.
    ///
    /// The local header carries zero CRC and sizes with flag bit 3 set; the
    /// real values follow the payload in a data descriptor. Once the header
    /// is in the sink, any failure leaves the writer [`WriterState::Failed`].
    pub fn add_entry_streamed<S: Read>(
        &mut self,
        name: impl AsRef<[u8]>,
        options: EntryOptions,
        mut source: S,
    ) -> Result<()> {
        self.ensure_open()?;
        self.entry_state = EntryState::Idle;
        let mut entry = self.prepare_entry(name.as_ref(), &options, true)?;

        let header = LocalFileHeader::for_entry(&entry).encode()?;
        self.emit(&header)?;
        self.advance(EntryState::HeaderWritten);

        // the provider writes straight into the sink; keep the sink's own
        // error apart from the provider's
        let mut sink = TrackedSink::new(&mut self.sink);
        let streamed = self
            .compressor
            .compress_stream(options.method, &mut source, &mut sink);
        let sink_error = sink.error.take();
        let summary = streamed.map_err(|e| {
            let err = match sink_error {
                Some(io) => ZipError::Io(io),
                None => ZipError::Compression(e),
            };
            self.abandon(err)
        })?;
        self.advance(EntryState::PayloadWritten);

        entry.crc32 = summary.crc32;
        entry.compressed_size = entry_size(summary.compressed_size).map_err(|e| self.abandon(e))?;
        entry.uncompressed_size =
            entry_size(summary.uncompressed_size).map_err(|e| self.abandon(e))?;

        let descriptor = DataDescriptor::for_entry(&entry)
            .encode()
            .map_err(|e| self.abandon(e))?;
        self.emit(&descriptor)?;
        if offset_u32(self.position()).is_none() {
            return Err(self.abandon(ZipError::LimitExceeded("archive larger than 4 GiB")));
        }

        self.stage(entry);
        Ok(())
    }

    /// Add an empty directory entry. A trailing `/` is appended if missing.
    pub fn add_directory(&mut self, name: impl AsRef<[u8]>) -> Result<()> {
        let mut name = name.as_ref().to_vec();
        if !name.ends_with(b"/") {
            name.push(b'/');
        }
        self.add_entry_with_options(name, &[], EntryOptions::new(CompressionMethod::Stored))
    }

    /// Write the central directory and the end record.
    ///
    /// Records are emitted in the order entries were added. Closing a second
    /// time fails with [`ZipError::WriterClosed`].
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;

        let mut directory = Vec::with_capacity(self.entries.iter().map(|e| e.central_len()).sum());
        for entry in &self.entries {
            directory.extend_from_slice(&entry.encode_central()?);
        }

        let (cd_offset, cd_size, entry_count) =
            match end_record_fields(self.position(), directory.len(), self.entries.len()) {
                Ok(fields) => fields,
                Err(e) => {
                    self.state = WriterState::Failed;
                    return Err(e);
                }
            };

        let end_record =
            EndOfCentralDirectory::new(entry_count, cd_size, cd_offset, self.options.comment.clone())
                .encode()?;

        self.emit(&directory)?;
        self.emit(&end_record)?;
        if let Err(e) = self.sink.flush() {
            self.state = WriterState::Failed;
            return Err(e.into());
        }

        self.state = WriterState::Closed;
        log::debug!(
            "closed archive: {} entries, central directory at {} ({} bytes), {} bytes total",
            entry_count,
            cd_offset,
            cd_size,
            self.position()
        );
        Ok(())
    }

    /// Close the archive if still open and hand back the sink.
    pub fn finish(mut self) -> Result<W> {
        match self.state {
            WriterState::Open => self.close()?,
            WriterState::Closed => {}
            WriterState::Failed => return Err(ZipError::WriterFailed),
        }
        Ok(self.sink.into_inner())
    }

    /// Give the sink back as is, closed or not.
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(ZipError::WriterClosed),
            WriterState::Failed => Err(ZipError::WriterFailed),
        }
    }

    /// Validate everything about a new entry that can be checked before any
    /// byte is written, and build its record with CRC and sizes still zero.
    fn prepare_entry(
        &self,
        name: &[u8],
        options: &EntryOptions,
        streaming: bool,
    ) -> Result<ZipFileEntry> {
        validate_name(name)?;
        if self.names.contains(name) {
            return Err(ZipError::DuplicateEntryName(
                String::from_utf8_lossy(name).into_owned(),
            ));
        }
        if !self.compressor.supports(options.method) {
            return Err(ZipError::UnsupportedMethod(options.method.as_u16()));
        }
        if self.entries.len() >= MAX_ENTRIES {
            return Err(ZipError::LimitExceeded("more than 65534 entries"));
        }
        for (field, bytes) in [("extra field", &options.extra_field), ("file comment", &options.comment)] {
            if bytes.len() > MAX_FIELD_LEN {
                return Err(ZipError::FieldTooLong {
                    field,
                    len: bytes.len(),
                    limit: MAX_FIELD_LEN,
                });
            }
        }
        let lfh_offset = offset_u32(self.position())
            .ok_or(ZipError::LimitExceeded("archive larger than 4 GiB"))?;

        let mut flags = 0;
        let mut version_needed = options.method.version_needed();
        if streaming {
            flags |= FLAG_DATA_DESCRIPTOR;
            version_needed = version_needed.max(VERSION_DEFLATED);
        }
        if !name.is_ascii() && std::str::from_utf8(name).is_ok() {
            flags |= FLAG_UTF8;
        }

        let is_directory = name.ends_with(b"/");
        Ok(ZipFileEntry {
            file_name: name.to_vec(),
            version_made_by: VERSION_DEFLATED,
            version_needed,
            flags,
            compression_method: options.method,
            modified: options.modified.unwrap_or(self.options.default_modified),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_number_start: 0,
            internal_attributes: 0,
            external_attributes: if is_directory { DOS_DIRECTORY_ATTRIBUTE } else { 0 },
            lfh_offset,
            extra_field: options.extra_field.clone(),
            comment: options.comment.clone(),
        })
    }

    /// Write to the sink; any I/O error is fatal for the archive.
    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        if let Err(e) = self.sink.write_all(bytes) {
            self.state = WriterState::Failed;
            return Err(e.into());
        }
        Ok(())
    }

    fn advance(&mut self, next: EntryState) {
        debug_assert!(next > self.entry_state, "{:?} -> {:?}", self.entry_state, next);
        self.entry_state = next;
    }

    /// Give up on the current entry. Once its header is in the sink the
    /// archive cannot be completed any more.
    fn abandon(&mut self, err: ZipError) -> ZipError {
        if self.entry_state > EntryState::Idle {
            log::debug!("entry abandoned after {:?}: {}", self.entry_state, err);
            self.state = WriterState::Failed;
        }
        err
    }

    fn stage(&mut self, entry: ZipFileEntry) {
        self.advance(EntryState::DirectoryRecordStaged);
        log::trace!(
            "staged {:?} at offset {}: {} -> {} bytes",
            entry.name(),
            entry.lfh_offset,
            entry.uncompressed_size,
            entry.compressed_size
        );
        self.names.insert(entry.file_name.clone());
        self.entries.push(entry);
    }
}

/// Passes writes through to the archive sink and keeps the first error the
/// sink itself reported.
struct TrackedSink<'a, W: Write> {
    inner: &'a mut CountingWriter<W>,
    error: Option<io::Error>,
}

impl<'a, W: Write> TrackedSink<'a, W> {
    fn new(inner: &'a mut CountingWriter<W>) -> Self {
        Self { inner, error: None }
    }

    /// Keep `err` and hand the caller an equivalent one.
    fn record(&mut self, err: io::Error) -> io::Error {
        if err.kind() == io::ErrorKind::Interrupted {
            return err;
        }
        let echo = io::Error::new(err.kind(), err.to_string());
        if self.error.is_none() {
            self.error = Some(err);
        }
        echo
    }
}

impl<W: Write> Write for TrackedSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => Ok(n),
            Err(e) => Err(self.record(e)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.flush() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record(e)),
        }
    }
}

/// `value` as a 32-bit offset or size. `0xFFFF_FFFF` is the ZIP64 marker
/// and is refused along with anything larger.
fn offset_u32(value: u64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v != u32::MAX)
}

fn entry_size(size: u64) -> Result<u32> {
    offset_u32(size).ok_or(ZipError::LimitExceeded("entry larger than 4 GiB"))
}

/// Directory offset, directory size and entry count for the end record.
fn end_record_fields(cd_offset: u64, cd_size: usize, entries: usize) -> Result<(u32, u32, u16)> {
    let (Some(cd_offset), Some(cd_size)) = (offset_u32(cd_offset), offset_u32(cd_size as u64))
    else {
        return Err(ZipError::LimitExceeded("central directory beyond 4 GiB"));
    };
    if entries > MAX_ENTRIES {
        return Err(ZipError::LimitExceeded("more than 65534 entries"));
    }
    Ok((cd_offset, cd_size, entries as u16))
}

fn validate_name(name: &[u8]) -> Result<()> {
    let invalid = |reason| ZipError::InvalidEntryName {
        name: String::from_utf8_lossy(name).into_owned(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_FIELD_LEN {
        return Err(ZipError::FieldTooLong {
            field: "file name",
            len: name.len(),
            limit: MAX_FIELD_LEN,
        });
    }
    if name[0] == b'/' {
        return Err(invalid("leading '/' is not allowed"));
    }
    if name.contains(&b'\\') {
        return Err(invalid("paths must use '/' separators"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::compression::{Compressed, Decompressed};
    use crate::zip::datetime::DosDateTime;
    use std::io;

    /// Refuses to compress payloads containing a marker byte.
    struct PickyCompressor;

    impl Compressor for PickyCompressor {
        fn supports(&self, method: CompressionMethod) -> bool {
            DefaultCompressor::default().supports(method)
        }

        fn compress(&self, method: CompressionMethod, raw: &[u8]) -> io::Result<Compressed> {
            if raw.contains(&b'!') {
                return Err(io::Error::other("refusing '!'"));
            }
            DefaultCompressor::default().compress(method, raw)
        }

        fn decompress(
            &self,
            method: CompressionMethod,
            data: &[u8],
            size_hint: u64,
        ) -> io::Result<Decompressed> {
            DefaultCompressor::default().decompress(method, data, size_hint)
        }
    }

    /// Accepts a limited number of bytes, then fails every write.
    struct FlakySink {
        written: Vec<u8>,
        budget: usize,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.budget {
                return Err(io::Error::other("disk full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Yields some bytes, then an error.
    struct BrokenSource(usize);

    impl Read for BrokenSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::other("source went away"));
            }
            let n = self.0.min(buf.len());
            buf[..n].fill(b'x');
            self.0 -= n;
            Ok(n)
        }
    }

    #[test]
    fn records_offsets_in_addition_order() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("a.txt", CompressionMethod::Stored, b"aaaa").unwrap();
        writer.add_entry("b.txt", CompressionMethod::Stored, b"bb").unwrap();

        let entries = writer.entries();
        assert_eq!(entries[0].lfh_offset, 0);
        assert_eq!(entries[1].lfh_offset, 30 + 5 + 4);
        assert_eq!(writer.position(), (30 + 5 + 4) + (30 + 5 + 2));
    }

    #[test]
    fn directory_and_end_record_are_consistent() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("one", CompressionMethod::Deflated, b"1111111111").unwrap();
        writer.add_entry("two", CompressionMethod::Stored, b"2").unwrap();
        writer.set_comment("made by a test").unwrap();
        let payload_end = writer.position();
        let data = writer.finish().unwrap();

        let eocd_at = data.len() - 22 - "made by a test".len();
        let (eocd, _) = EndOfCentralDirectory::decode(&data[eocd_at..]).unwrap();
        assert_eq!(eocd.total_entries, 2);
        assert_eq!(eocd.disk_entries, 2);
        assert_eq!(eocd.cd_offset as u64, payload_end);
        assert_eq!(eocd.cd_offset as usize + eocd.cd_size as usize, eocd_at);
        assert_eq!(eocd.cd_size as usize, (46 + 3) * 2);
        assert_eq!(eocd.comment, b"made by a test");
    }

    #[test]
    fn duplicate_name_keeps_writer_usable() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("a.txt", CompressionMethod::Stored, b"first").unwrap();
        let before = writer.position();

        let err = writer
            .add_entry("a.txt", CompressionMethod::Stored, b"second")
            .unwrap_err();
        assert!(matches!(err, ZipError::DuplicateEntryName(ref n) if n == "a.txt"));
        assert_eq!(writer.state(), WriterState::Open);
        assert_eq!(writer.position(), before);

        writer.close().unwrap();
        assert_eq!(writer.entries().len(), 1);
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.add_entry("A.txt", CompressionMethod::Stored, b"").unwrap();
        writer.add_entry("a.txt", CompressionMethod::Stored, b"").unwrap();
        assert_eq!(writer.entries().len(), 2);
    }

    #[test]
    fn rejects_bad_names_and_methods() {
        let mut writer = ZipWriter::new(Vec::new());
        for name in ["", "/etc/passwd", "dir\\file"] {
            assert!(matches!(
                writer.add_entry(name, CompressionMethod::Stored, b""),
                Err(ZipError::InvalidEntryName { .. })
            ));
        }
        assert!(matches!(
            writer.add_entry("x", CompressionMethod::Imploded, b""),
            Err(ZipError::UnsupportedMethod(6))
        ));
        assert!(matches!(
            writer.add_entry("y", CompressionMethod::from_u16(99), b""),
            Err(ZipError::UnsupportedMethod(99))
        ));
        assert_eq!(writer.position(), 0);
        assert_eq!(writer.state(), WriterState::Open);
    }

    #[test]
    fn compressor_failure_only_aborts_that_entry() {
        let mut writer =
            ZipWriter::with_compressor(Vec::new(), WriterOptions::default(), PickyCompressor);
        writer.add_entry("ok.txt", CompressionMethod::Deflated, b"fine").unwrap();

        let err = writer
            .add_entry("bad.txt", CompressionMethod::Deflated, b"nope!")
            .unwrap_err();
        assert!(matches!(err, ZipError::Compression(_)));
        assert_eq!(writer.state(), WriterState::Open);

        writer.add_entry("bad.txt", CompressionMethod::Deflated, b"nope").unwrap();
        writer.close().unwrap();
        assert_eq!(writer.entries().len(), 2);
    }

    #[test]
    fn sink_failure_is_fatal() {
        let sink = FlakySink {
            written: Vec::new(),
            budget: 40,
        };
        let mut writer = ZipWriter::new(sink);
        writer.add_entry("a", CompressionMethod::Stored, b"12345").unwrap();

        assert!(matches!(
            writer.add_entry("b", CompressionMethod::Stored, b"12345"),
            Err(ZipError::Io(_))
        ));
        assert_eq!(writer.state(), WriterState::Failed);
        assert!(matches!(
            writer.add_entry("c", CompressionMethod::Stored, b""),
            Err(ZipError::WriterFailed)
        ));
        assert!(matches!(writer.close(), Err(ZipError::WriterFailed)));
    }

    #[test]
    fn streamed_sink_failure_is_an_io_error() {
        let sink = FlakySink {
            written: Vec::new(),
            budget: 40,
        };
        let mut writer = ZipWriter::new(sink);
        let err = writer
            .add_entry_streamed(
                "s.bin",
                EntryOptions::new(CompressionMethod::Stored),
                &[7u8; 100][..],
            )
            .unwrap_err();
        match err {
            ZipError::Io(e) => assert_eq!(e.to_string(), "disk full"),
            other => panic!("expected an I/O error, got {other:?}"),
        }
        assert_eq!(writer.state(), WriterState::Failed);
        assert_eq!(writer.entry_state(), EntryState::HeaderWritten);

        // same through the deflate encoder
        let sink = FlakySink {
            written: Vec::new(),
            budget: 40,
        };
        let mut writer = ZipWriter::with_options(sink, WriterOptions::new().with_compression_level(0));
        let err = writer
            .add_entry_streamed(
                "s.bin",
                EntryOptions::new(CompressionMethod::Deflated),
                &[7u8; 100][..],
            )
            .unwrap_err();
        assert!(matches!(err, ZipError::Io(_)), "{err:?}");
        assert_eq!(writer.state(), WriterState::Failed);
    }

    #[test]
    fn entry_state_follows_each_record() {
        let mut writer = ZipWriter::new(Vec::new());
        assert_eq!(writer.entry_state(), EntryState::Idle);
        writer.add_entry("a", CompressionMethod::Stored, b"12345").unwrap();
        assert_eq!(writer.entry_state(), EntryState::DirectoryRecordStaged);

        // refused before any byte is written
        writer.add_entry("a", CompressionMethod::Stored, b"").unwrap_err();
        assert_eq!(writer.entry_state(), EntryState::Idle);

        // header (31 bytes) fits after the first entry (36 bytes), payload
        // does not
        let sink = FlakySink {
            written: Vec::new(),
            budget: 70,
        };
        let mut writer = ZipWriter::new(sink);
        writer.add_entry("a", CompressionMethod::Stored, b"12345").unwrap();
        assert!(matches!(
            writer.add_entry("b", CompressionMethod::Stored, b"12345"),
            Err(ZipError::Io(_))
        ));
        assert_eq!(writer.entry_state(), EntryState::HeaderWritten);
        assert_eq!(writer.state(), WriterState::Failed);
    }

    #[test]
    fn end_record_never_carries_zip64_markers() {
        assert_eq!(end_record_fields(100, 46, 1).unwrap(), (100, 46, 1));
        assert_eq!(
            end_record_fields(u32::MAX as u64 - 1, 0, MAX_ENTRIES).unwrap(),
            (u32::MAX - 1, 0, u16::MAX - 1)
        );
        for (offset, size, count) in [
            (u32::MAX as u64, 0, 0),
            (0, u32::MAX as usize, 0),
            (0, 0, MAX_ENTRIES + 1),
        ] {
            assert!(matches!(
                end_record_fields(offset, size, count),
                Err(ZipError::LimitExceeded(_))
            ));
        }
        assert_eq!(offset_u32(u32::MAX as u64), None);
        assert!(matches!(entry_size(u32::MAX as u64), Err(ZipError::LimitExceeded(_))));
    }

    #[test]
    fn closing_twice_is_an_error() {
        let mut writer = ZipWriter::new(Vec::new());
        writer.close().unwrap();
        assert_eq!(writer.state(), WriterState::Closed);
        assert!(matches!(writer.close(), Err(ZipError::WriterClosed)));
        assert!(matches!(
            writer.add_entry("late.txt", CompressionMethod::Stored, b""),
            Err(ZipError::WriterClosed)
        ));

        // an empty archive is just the end record
        assert_eq!(writer.into_inner().len(), 22);
    }

    #[test]
    fn streamed_entry_gets_a_data_descriptor() {
        let text = b"streamed streamed streamed streamed".to_vec();
        let mut writer = ZipWriter::new(Vec::new());
        writer
            .add_entry_streamed("s.txt", EntryOptions::new(CompressionMethod::Deflated), &text[..])
            .unwrap();

        let entry = writer.entries()[0].clone();
        assert!(entry.has_data_descriptor());
        assert_eq!(entry.crc32, crc32fast::hash(&text));
        assert_eq!(entry.uncompressed_size as usize, text.len());

        let data = writer.finish().unwrap();
        let (local, consumed) = LocalFileHeader::decode(&data).unwrap();
        assert_eq!((local.crc32, local.compressed_size, local.uncompressed_size), (0, 0, 0));
        assert_eq!(local.flags & FLAG_DATA_DESCRIPTOR, FLAG_DATA_DESCRIPTOR);

        let descriptor_at = consumed + entry.compressed_size as usize;
        let (descriptor, _) = DataDescriptor::decode(&data[descriptor_at..]).unwrap();
        assert_eq!(descriptor, DataDescriptor::for_entry(&entry));
    }

    #[test]
    fn streaming_failure_after_header_is_fatal() {
        let mut writer = ZipWriter::new(Vec::new());
        let err = writer
            .add_entry_streamed("s.bin", EntryOptions::new(CompressionMethod::Stored), BrokenSource(10))
            .unwrap_err();
        assert!(matches!(err, ZipError::Compression(_)));
        assert_eq!(writer.state(), WriterState::Failed);
        assert_eq!(writer.entry_state(), EntryState::HeaderWritten);
        assert!(writer.finish().is_err());
    }

    #[test]
    fn entry_options_are_recorded() {
        let modified = DosDateTime::new(2001, 9, 9, 1, 46, 40).unwrap();
        let mut writer = ZipWriter::new(Vec::new());
        writer
            .add_entry_with_options(
                "café.txt",
                b"x",
                EntryOptions::new(CompressionMethod::Stored)
                    .modified(modified)
                    .extra_field(vec![1, 2, 3, 4])
                    .comment("per-entry"),
            )
            .unwrap();
        writer.add_directory("docs").unwrap();

        let entries = writer.entries();
        assert_eq!(entries[0].modified, modified);
        assert_eq!(entries[0].extra_field, vec![1, 2, 3, 4]);
        assert_eq!(entries[0].comment, b"per-entry");
        assert_eq!(entries[0].flags & FLAG_UTF8, FLAG_UTF8);
        assert_eq!(entries[1].file_name, b"docs/");
        assert!(entries[1].is_directory());
        assert_eq!(entries[1].external_attributes, DOS_DIRECTORY_ATTRIBUTE);
        assert_eq!(entries[1].modified, DosDateTime::EPOCH);
    }

    #[test]
    fn oversized_comment_is_refused() {
        let mut writer = ZipWriter::new(Vec::new());
        assert!(matches!(
            writer.set_comment(vec![0u8; MAX_FIELD_LEN + 1]),
            Err(ZipError::FieldTooLong { .. })
        ));
    }
}
