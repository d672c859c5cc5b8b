//! Core capability traits for the EWF engine
//!
//! The source's function-pointer I/O abstraction ("bfio") is modeled here
//! as a plain Rust trait rather than a registered plugin: any type
//! implementing [`SegmentIo`] can back a segment file, whether it is a
//! real file, a memory buffer, or a test double.

use crate::error::Result;
use std::io::{Read, Seek, Write};

/// Combined trait for Read + Seek, the minimum a segment file reader needs
pub trait ReadSeek: Read + Seek + Send {}

/// Blanket implementation for any type that implements Read + Seek
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Combined trait for Read + Write + Seek, for segment files opened for
/// writing or for the delta-segment read-write case
pub trait ReadWriteSeek: Read + Write + Seek + Send {}

/// Blanket implementation for any type that implements Read + Write + Seek
impl<T: Read + Write + Seek + Send> ReadWriteSeek for T {}

/// A capability object satisfying a segment file's need to read, write,
/// and query the size of its backing storage without depending on a
/// concrete filesystem type.
///
/// File-backed and memory-backed implementations both satisfy this trait;
/// the handle never registers or looks up implementations by name.
pub trait SegmentIo: Send {
    /// Read `buf.len()` bytes starting at `offset`, returning the number of
    /// bytes actually read (short on EOF).
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf` starting at `offset`, returning the number of bytes written.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// Total size of the backing storage in bytes.
    fn size(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn accepts_read_seek<T: ReadSeek>(_: T) {}

    #[test]
    fn cursor_satisfies_read_seek() {
        accepts_read_seek(Cursor::new(vec![0u8; 4]));
    }
}
