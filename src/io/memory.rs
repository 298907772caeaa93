use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom};

use super::ReadAt;

impl ReadAt for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let start = match usize::try_from(offset) {
            Ok(start) if start < self.len() => start,
            _ => return Ok(0),
        };
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.as_slice().read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Adapts a caller-supplied `Read + Seek` source to [`ReadAt`].
///
/// The size is measured once, when the adapter is built. Every positioned
/// read seeks the inner source first, so the source position is unspecified
/// afterwards. Use [`SeekReader::into_inner`] to hand the source back.
#[derive(Debug)]
pub struct SeekReader<R> {
    inner: RefCell<R>,
    size: u64,
}

impl<R: Read + Seek> SeekReader<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let size = inner.seek(SeekFrom::End(0))?;
        Ok(Self {
            inner: RefCell::new(inner),
            size,
        })
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R: Read + Seek> ReadAt for SeekReader<R> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        inner.seek(SeekFrom::Start(offset))?;
        inner.read(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn slice_reads_stop_at_the_end() {
        let data = b"abcdef".to_vec();
        let mut buf = [0u8; 4];
        assert_eq!(data.read_at(4, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        assert_eq!(data.read_at(6, &mut buf).unwrap(), 0);
        assert_eq!(data.read_at(u64::MAX, &mut buf).unwrap(), 0);
    }

    #[test]
    fn seek_reader_measures_and_reads() {
        let reader = SeekReader::new(Cursor::new(b"hello world".to_vec())).unwrap();
        assert_eq!(reader.size(), 11);

        let mut buf = [0u8; 5];
        reader.read_exact_at(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
        reader.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"hello");
    }
}
