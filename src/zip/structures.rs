//! Binary layouts of the four ZIP record types.
//!
//! Every record starts with a 4-byte signature and is followed by fixed
//! little-endian fields, then by its variable-length trailing fields. The
//! variable lengths are always derived from the byte vectors at encode time.

use std::borrow::Cow;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{RecordKind, Result, ZipError};

use super::datetime::DosDateTime;

/// Local File Header (LFH) signature, `PK\x03\x04`
pub const LFH_SIGNATURE: u32 = 0x0403_4b50;
/// Data descriptor signature, `PK\x07\x08`
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;
/// Central Directory File Header (CDFH) signature, `PK\x01\x02`
pub const CDFH_SIGNATURE: u32 = 0x0201_4b50;
/// End of Central Directory signature, `PK\x05\x06`
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;

/// Largest name, extra field or comment a 2-byte length can describe.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Most entries one archive can hold. An entry count of `0xFFFF` in the end
/// record is the ZIP64 marker, so the last value is not usable.
pub const MAX_ENTRIES: usize = u16::MAX as usize - 1;

/// General purpose flag bit 0: the entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 1 << 0;
/// General purpose flag bit 3: CRC and sizes follow the payload.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag bit 11: name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// "Version made by" / "version needed" values written by this crate.
pub const VERSION_STORED: u16 = 10;
pub const VERSION_DEFLATED: u16 = 20;

/// MS-DOS directory attribute, stored in the external attributes.
pub const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    Stored,
    Shrunk,
    /// Reduced with compression factor 1 to 4.
    Reduced(u8),
    Imploded,
    Tokenized,
    Deflated,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            1 => CompressionMethod::Shrunk,
            2..=5 => CompressionMethod::Reduced((value - 1) as u8),
            6 => CompressionMethod::Imploded,
            7 => CompressionMethod::Tokenized,
            8 => CompressionMethod::Deflated,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Shrunk => 1,
            CompressionMethod::Reduced(factor) => 1 + *factor as u16,
            CompressionMethod::Imploded => 6,
            CompressionMethod::Tokenized => 7,
            CompressionMethod::Deflated => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// Minimum "version needed to extract" for this method.
    pub fn version_needed(&self) -> u16 {
        match self {
            CompressionMethod::Stored => VERSION_STORED,
            _ => VERSION_DEFLATED,
        }
    }
}

/// Verify the 4-byte signature at the start of `data`.
fn check_signature(data: &[u8], record: RecordKind, expected: u32) -> Result<()> {
    if data.len() < 4 {
        return Err(ZipError::truncated(record, 4, data.len()));
    }
    let found = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if found != expected {
        return Err(ZipError::MalformedSignature {
            record,
            expected,
            found,
        });
    }
    Ok(())
}

fn check_fixed_len(data: &[u8], record: RecordKind, size: usize) -> Result<()> {
    if data.len() < size {
        return Err(ZipError::truncated(record, size, data.len()));
    }
    Ok(())
}

/// Length of a variable field as it will be written into a 2-byte slot.
fn field_len(field: &'static str, bytes: &[u8]) -> Result<u16> {
    u16::try_from(bytes.len()).map_err(|_| ZipError::FieldTooLong {
        field,
        len: bytes.len(),
        limit: MAX_FIELD_LEN,
    })
}

/// Split the variable-length trailer of a record into its fields.
fn split_fields<const N: usize>(
    data: &[u8],
    fixed: usize,
    lens: [u16; N],
    record: RecordKind,
) -> Result<([Vec<u8>; N], usize)> {
    let total = fixed + lens.iter().map(|&l| l as usize).sum::<usize>();
    if data.len() < total {
        return Err(ZipError::truncated(record, total, data.len()));
    }

    let mut pos = fixed;
    let fields = lens.map(|len| {
        let field = data[pos..pos + len as usize].to_vec();
        pos += len as usize;
        field
    });
    Ok((fields, total))
}

/// Local File Header (LFH) - 30 bytes + name + extra field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: Vec<u8>,
    pub extra_field: Vec<u8>,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = LFH_SIGNATURE;
    pub const SIZE: usize = 30;

    /// Build the local header for an entry. Entries in streaming mode get
    /// zeroed CRC and sizes; the real values go into the data descriptor.
    pub fn for_entry(entry: &ZipFileEntry) -> Self {
        let (crc32, compressed_size, uncompressed_size) = if entry.has_data_descriptor() {
            (0, 0, 0)
        } else {
            (entry.crc32, entry.compressed_size, entry.uncompressed_size)
        };

        Self {
            version_needed: entry.version_needed,
            flags: entry.flags,
            compression_method: entry.compression_method,
            modified: entry.modified,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name: entry.file_name.clone(),
            extra_field: entry.extra_field.clone(),
        }
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Total encoded length including the variable fields.
    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.file_name.len() + self.extra_field.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let name_len = field_len("file name", &self.file_name)?;
        let extra_len = field_len("extra field", &self.extra_field)?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.modified.time())?;
        out.write_u16::<LittleEndian>(self.modified.date())?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(extra_len)?;
        out.extend_from_slice(&self.file_name);
        out.extend_from_slice(&self.extra_field);
        Ok(out)
    }

    /// Total header length announced by the fixed 30-byte prefix.
    pub fn encoded_len_from_prefix(data: &[u8]) -> Result<usize> {
        check_signature(data, RecordKind::LocalFileHeader, Self::SIGNATURE)?;
        check_fixed_len(data, RecordKind::LocalFileHeader, Self::SIZE)?;
        let name_len = u16::from_le_bytes([data[26], data[27]]) as usize;
        let extra_len = u16::from_le_bytes([data[28], data[29]]) as usize;
        Ok(Self::SIZE + name_len + extra_len)
    }

    /// Decode a header, returning it with the number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let record = RecordKind::LocalFileHeader;
        check_signature(data, record, Self::SIGNATURE)?;
        check_fixed_len(data, record, Self::SIZE)?;

        let mut cursor = Cursor::new(&data[4..Self::SIZE]);
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?);
        let time = cursor.read_u16::<LittleEndian>()?;
        let date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;

        let ([file_name, extra_field], consumed) =
            split_fields(data, Self::SIZE, [name_len, extra_len], record)?;

        Ok((
            Self {
                version_needed,
                flags,
                compression_method,
                modified: DosDateTime::from_raw(time, date),
                crc32,
                compressed_size,
                uncompressed_size,
                file_name,
                extra_field,
            },
            consumed,
        ))
    }
}

/// Data descriptor ("extended local header") - 16 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub const SIGNATURE: u32 = DATA_DESCRIPTOR_SIGNATURE;
    pub const SIZE: usize = 16;

    pub fn for_entry(entry: &ZipFileEntry) -> Self {
        Self {
            crc32: entry.crc32,
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        Ok(out)
    }

    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let record = RecordKind::DataDescriptor;
        check_signature(data, record, Self::SIGNATURE)?;
        check_fixed_len(data, record, Self::SIZE)?;

        let mut cursor = Cursor::new(&data[4..Self::SIZE]);
        Ok((
            Self {
                crc32: cursor.read_u32::<LittleEndian>()?,
                compressed_size: cursor.read_u32::<LittleEndian>()?,
                uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            },
            Self::SIZE,
        ))
    }
}

/// Parsed ZIP file entry information.
///
/// This is the full central directory record: the writer stages one per
/// entry and serializes it at close, the reader materializes one per record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipFileEntry {
    pub file_name: Vec<u8>,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub disk_number_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub lfh_offset: u32,
    pub extra_field: Vec<u8>,
    pub comment: Vec<u8>,
}

impl ZipFileEntry {
    pub const SIGNATURE: u32 = CDFH_SIGNATURE;
    /// Central Directory File Header (CDFH) - 46 bytes minimum
    pub const MIN_SIZE: usize = 46;

    /// Entry name, with invalid UTF-8 replaced.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.file_name)
    }

    /// Directory entries end with '/'
    pub fn is_directory(&self) -> bool {
        self.file_name.ends_with(b"/")
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let parts = self.modified.parts();
        (parts.year, parts.month, parts.day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let parts = self.modified.parts();
        (parts.hour, parts.minute, parts.second)
    }

    /// Encoded length of the central directory record.
    pub fn central_len(&self) -> usize {
        Self::MIN_SIZE + self.file_name.len() + self.extra_field.len() + self.comment.len()
    }

    pub fn encode_central(&self) -> Result<Vec<u8>> {
        let name_len = field_len("file name", &self.file_name)?;
        let extra_len = field_len("extra field", &self.extra_field)?;
        let comment_len = field_len("file comment", &self.comment)?;

        let mut out = Vec::with_capacity(self.central_len());
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.modified.time())?;
        out.write_u16::<LittleEndian>(self.modified.date())?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(extra_len)?;
        out.write_u16::<LittleEndian>(comment_len)?;
        out.write_u16::<LittleEndian>(self.disk_number_start)?;
        out.write_u16::<LittleEndian>(self.internal_attributes)?;
        out.write_u32::<LittleEndian>(self.external_attributes)?;
        out.write_u32::<LittleEndian>(self.lfh_offset)?;
        out.extend_from_slice(&self.file_name);
        out.extend_from_slice(&self.extra_field);
        out.extend_from_slice(&self.comment);
        Ok(out)
    }

    /// Decode one central directory record from the start of `data`.
    pub fn decode_central(data: &[u8]) -> Result<(Self, usize)> {
        let record = RecordKind::CentralDirectory;
        check_signature(data, record, Self::SIGNATURE)?;
        check_fixed_len(data, record, Self::MIN_SIZE)?;

        let mut cursor = Cursor::new(&data[4..Self::MIN_SIZE]);
        let version_made_by = cursor.read_u16::<LittleEndian>()?;
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?);
        let time = cursor.read_u16::<LittleEndian>()?;
        let date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()?;
        let extra_len = cursor.read_u16::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()?;
        let disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let internal_attributes = cursor.read_u16::<LittleEndian>()?;
        let external_attributes = cursor.read_u32::<LittleEndian>()?;
        let lfh_offset = cursor.read_u32::<LittleEndian>()?;

        let ([file_name, extra_field, comment], consumed) = split_fields(
            data,
            Self::MIN_SIZE,
            [name_len, extra_len, comment_len],
            record,
        )?;

        Ok((
            Self {
                file_name,
                version_made_by,
                version_needed,
                flags,
                compression_method,
                modified: DosDateTime::from_raw(time, date),
                crc32,
                compressed_size,
                uncompressed_size,
                disk_number_start,
                internal_attributes,
                external_attributes,
                lfh_offset,
                extra_field,
                comment,
            },
            consumed,
        ))
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = EOCD_SIGNATURE;
    pub const SIZE: usize = 22;

    /// End record for a single-disk archive.
    pub fn new(entry_count: u16, cd_size: u32, cd_offset: u32, comment: Vec<u8>) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: entry_count,
            total_entries: entry_count,
            cd_size,
            cd_offset,
            comment,
        }
    }

    pub fn encoded_len(&self) -> usize {
        Self::SIZE + self.comment.len()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let comment_len = field_len("archive comment", &self.comment)?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(comment_len)?;
        out.extend_from_slice(&self.comment);
        Ok(out)
    }

    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        let record = RecordKind::EndOfCentralDirectory;
        check_signature(data, record, Self::SIGNATURE)?;
        check_fixed_len(data, record, Self::SIZE)?;

        let mut cursor = Cursor::new(&data[4..Self::SIZE]);
        let disk_number = cursor.read_u16::<LittleEndian>()?;
        let disk_with_cd = cursor.read_u16::<LittleEndian>()?;
        let disk_entries = cursor.read_u16::<LittleEndian>()?;
        let total_entries = cursor.read_u16::<LittleEndian>()?;
        let cd_size = cursor.read_u32::<LittleEndian>()?;
        let cd_offset = cursor.read_u32::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()?;

        let ([comment], consumed) = split_fields(data, Self::SIZE, [comment_len], record)?;

        Ok((
            Self {
                disk_number,
                disk_with_cd,
                disk_entries,
                total_entries,
                cd_size,
                cd_offset,
                comment,
            },
            consumed,
        ))
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }

    pub fn is_multi_disk(&self) -> bool {
        self.disk_number != 0 || self.disk_with_cd != 0 || self.disk_entries != self.total_entries
    }
}
