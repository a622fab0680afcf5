//! Byte-source/byte-sink seam. The driver (`crate::driver`) is generic over
//! any `Read`/`Write` implementation, so plain files, stdin/stdout, and
//! `flate2` gzip streams all work through it without the core ever naming
//! them (ground: `submerge-coldb::ioutil`'s `Reader`/`Writer` traits, stripped
//! of the `Seek`/`try_clone_independent` machinery that only made sense for
//! the donor's random-access column store).

use std::io::{Cursor, Read, Write};

/// Anything the driver can refill its sliding buffer from.
pub trait ByteSource: Read {}
impl<T: Read> ByteSource for T {}

/// Anything the driver can flush its output buffer to.
pub trait ByteSink: Write {}
impl<T: Write> ByteSink for T {}

/// An in-memory byte source, mainly for tests: lets a whole input be fed to
/// the driver through the same `Read` seam a real file would use.
pub struct MemSource {
    cursor: Cursor<Vec<u8>>,
}

impl MemSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        MemSource {
            cursor: Cursor::new(data.into()),
        }
    }
}

impl Read for MemSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.cursor.read(buf)
    }
}

/// An in-memory byte sink, mainly for tests.
#[derive(Default)]
pub struct MemSink {
    data: Vec<u8>,
}

impl MemSink {
    pub fn new() -> Self {
        MemSink::default()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Write for MemSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
