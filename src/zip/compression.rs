//! The compression capability the writer and reader call into.
//!
//! The archive layer never compresses or checksums anything itself: it hands
//! raw bytes to a [`Compressor`] and trusts the CRC-32 and sizes it returns.
//! [`DefaultCompressor`] covers the two methods most archives use, STORED and
//! DEFLATE, through `flate2` and `crc32fast`.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::io::CountingWriter;

use super::structures::CompressionMethod;

/// Output of compressing a whole payload in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub data: Vec<u8>,
    /// CRC-32 of the uncompressed input.
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
}

/// Output of decompressing a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompressed {
    pub data: Vec<u8>,
    /// CRC-32 of `data`.
    pub crc32: u32,
}

/// What a streamed entry turned out to be once the source was drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
}

/// Pluggable compression and checksum provider.
pub trait Compressor {
    /// Whether `method` can be both compressed and decompressed.
    fn supports(&self, method: CompressionMethod) -> bool;

    fn compress(&self, method: CompressionMethod, raw: &[u8]) -> io::Result<Compressed>;

    /// Decompress `data`. Output beyond `size_hint + 1` bytes may be cut
    /// off, so callers can still detect an oversized entry without
    /// materializing all of it.
    fn decompress(
        &self,
        method: CompressionMethod,
        data: &[u8],
        size_hint: u64,
    ) -> io::Result<Decompressed>;

    /// Compress everything `source` yields straight into `sink`.
    ///
    /// The default buffers the whole source and defers to
    /// [`Compressor::compress`].
    fn compress_stream(
        &self,
        method: CompressionMethod,
        source: &mut dyn Read,
        sink: &mut dyn Write,
    ) -> io::Result<StreamSummary> {
        let mut raw = Vec::new();
        source.read_to_end(&mut raw)?;
        let compressed = self.compress(method, &raw)?;
        sink.write_all(&compressed.data)?;
        Ok(StreamSummary {
            crc32: compressed.crc32,
            uncompressed_size: compressed.uncompressed_size,
            compressed_size: compressed.compressed_size,
        })
    }
}

impl<C: Compressor + ?Sized> Compressor for &C {
    fn supports(&self, method: CompressionMethod) -> bool {
        (**self).supports(method)
    }

    fn compress(&self, method: CompressionMethod, raw: &[u8]) -> io::Result<Compressed> {
        (**self).compress(method, raw)
    }

    fn decompress(
        &self,
        method: CompressionMethod,
        data: &[u8],
        size_hint: u64,
    ) -> io::Result<Decompressed> {
        (**self).decompress(method, data, size_hint)
    }

    fn compress_stream(
        &self,
        method: CompressionMethod,
        source: &mut dyn Read,
        sink: &mut dyn Write,
    ) -> io::Result<StreamSummary> {
        (**self).compress_stream(method, source, sink)
    }
}

fn unsupported(method: CompressionMethod) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("compression method {} is not available", method.as_u16()),
    )
}

/// STORED and raw DEFLATE via `flate2`, CRC-32 via `crc32fast`.
#[derive(Debug, Clone, Copy)]
pub struct DefaultCompressor {
    level: Compression,
}

impl DefaultCompressor {
    pub const DEFAULT_LEVEL: u32 = 6;

    /// `level` is clamped to 0..=9.
    pub fn new(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for DefaultCompressor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl Compressor for DefaultCompressor {
    fn supports(&self, method: CompressionMethod) -> bool {
        matches!(
            method,
            CompressionMethod::Stored | CompressionMethod::Deflated
        )
    }

    fn compress(&self, method: CompressionMethod, raw: &[u8]) -> io::Result<Compressed> {
        let data = match method {
            CompressionMethod::Stored => raw.to_vec(),
            CompressionMethod::Deflated => {
                let mut encoder = DeflateEncoder::new(Vec::new(), self.level);
                encoder.write_all(raw)?;
                encoder.finish()?
            }
            other => return Err(unsupported(other)),
        };

        Ok(Compressed {
            crc32: crc32fast::hash(raw),
            uncompressed_size: raw.len() as u64,
            compressed_size: data.len() as u64,
            data,
        })
    }

    fn decompress(
        &self,
        method: CompressionMethod,
        data: &[u8],
        size_hint: u64,
    ) -> io::Result<Decompressed> {
        let data = match method {
            CompressionMethod::Stored => data.to_vec(),
            CompressionMethod::Deflated => {
                let limit = size_hint.saturating_add(1);
                let mut out = Vec::with_capacity(size_hint.min(1 << 20) as usize);
                DeflateDecoder::new(data).take(limit).read_to_end(&mut out)?;
                out
            }
            other => return Err(unsupported(other)),
        };

        Ok(Decompressed {
            crc32: crc32fast::hash(&data),
            data,
        })
    }

    fn compress_stream(
        &self,
        method: CompressionMethod,
        source: &mut dyn Read,
        sink: &mut dyn Write,
    ) -> io::Result<StreamSummary> {
        let mut source = HashingReader::new(source);
        let compressed_size = match method {
            CompressionMethod::Stored => io::copy(&mut source, sink)?,
            CompressionMethod::Deflated => {
                let mut encoder = DeflateEncoder::new(CountingWriter::new(sink), self.level);
                io::copy(&mut source, &mut encoder)?;
                encoder.finish()?.position()
            }
            other => return Err(unsupported(other)),
        };

        Ok(StreamSummary {
            crc32: source.hasher.clone().finalize(),
            uncompressed_size: source.count,
            compressed_size,
        })
    }
}

/// Checksums and counts the bytes read through it.
struct HashingReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    count: u64,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            count: 0,
        }
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Inflate through the write-side decoder, independent of `decompress`.
    fn inflate_into(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut decoder = flate2::write::DeflateDecoder::new(Vec::new());
        decoder.write_all(data)?;
        decoder.finish()
    }

    const TEXT: &[u8] = b"world world world world world world world world";

    #[test]
    fn stored_is_identity_with_crc() {
        let c = DefaultCompressor::default();
        let out = c.compress(CompressionMethod::Stored, TEXT).unwrap();
        assert_eq!(out.data, TEXT);
        assert_eq!(out.crc32, crc32fast::hash(TEXT));
        assert_eq!(out.compressed_size, out.uncompressed_size);
    }

    #[test]
    fn deflate_shrinks_repetitive_input_and_restores_it() {
        let c = DefaultCompressor::default();
        let out = c.compress(CompressionMethod::Deflated, TEXT).unwrap();
        assert!(out.compressed_size < out.uncompressed_size);

        let back = c
            .decompress(CompressionMethod::Deflated, &out.data, out.uncompressed_size)
            .unwrap();
        assert_eq!(back.data, TEXT);
        assert_eq!(back.crc32, out.crc32);
    }

    #[test]
    fn decompress_stops_one_byte_past_the_hint() {
        let c = DefaultCompressor::default();
        let out = c.compress(CompressionMethod::Deflated, TEXT).unwrap();
        let back = c.decompress(CompressionMethod::Deflated, &out.data, 4).unwrap();
        assert_eq!(back.data.len(), 5);
    }

    #[test]
    fn streaming_matches_in_memory_results() {
        let c = DefaultCompressor::default();
        let mut sink = Vec::new();
        let summary = c
            .compress_stream(CompressionMethod::Deflated, &mut &TEXT[..], &mut sink)
            .unwrap();

        assert_eq!(summary.crc32, crc32fast::hash(TEXT));
        assert_eq!(summary.uncompressed_size, TEXT.len() as u64);
        assert_eq!(summary.compressed_size, sink.len() as u64);
        assert_eq!(inflate_into(&sink).unwrap(), TEXT);
    }

    #[test]
    fn other_methods_are_refused() {
        let c = DefaultCompressor::default();
        assert!(!c.supports(CompressionMethod::Imploded));
        let err = c.compress(CompressionMethod::Imploded, TEXT).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }
}
