use std::io::{self, Write};

/// A sink wrapper that counts every byte accepted by the inner writer.
///
/// The count starts at zero, so it is the offset relative to the first byte
/// of the archive regardless of where the inner sink was positioned.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_written_bytes() {
        let mut writer = CountingWriter::new(Vec::new());
        writer.write_all(b"PK").unwrap();
        writer.write_all(&[3, 4]).unwrap();
        assert_eq!(writer.position(), 4);
        assert_eq!(writer.into_inner(), vec![b'P', b'K', 3, 4]);
    }
}
