//! Byte sources and sinks used by the archive reader and writer.
//!
//! Reading goes through [`ReadAt`], a positioned-read abstraction that lets
//! the parser jump straight to the end record, the central directory and any
//! local header. Writing goes through [`CountingWriter`], which tracks the
//! absolute archive offset of every byte handed to the sink.

mod counting;
mod local;
mod memory;

pub use counting::CountingWriter;
pub use local::LocalFileReader;
pub use memory::SeekReader;

use std::io;

/// Trait for random access reading from a data source
pub trait ReadAt {
    /// Read data at the specified offset into the buffer, returning how many
    /// bytes were read. A short read only happens at the end of the source.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill `buf` completely from `offset`, failing with
    /// [`io::ErrorKind::UnexpectedEof`] when the source ends first.
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "source ended before the requested range",
                    ));
                }
                Ok(n) => {
                    offset += n as u64;
                    let rest = buf;
                    buf = &mut rest[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}
