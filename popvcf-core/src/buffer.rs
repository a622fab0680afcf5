//! The sliding byte buffer. A fixed-capacity window that the driver refills
//! from a byte source and the scanners consume field-by-field; a trailing
//! partial field is preserved by `compact` so it is never split across a
//! scanner call (ground: `popvcf`'s `decode.cpp` refill loop: `memmove` the
//! unconsumed tail to offset 0, then read more after it).

use popvcf_base::{Error, Result};
use std::io::Read;

pub struct SlidingBuffer {
    data: Vec<u8>,
    capacity: usize,
    filled: usize,
}

impl SlidingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        SlidingBuffer {
            data: vec![0u8; capacity],
            capacity,
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of valid bytes currently in the buffer, starting at 0.
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    /// Reads more bytes from `source` into the tail of the buffer, appending
    /// after the `preserved` bytes already sitting at the front (the
    /// trailing partial field kept by the previous `compact`). Returns the
    /// number of bytes read; 0 means end of stream.
    pub fn refill(&mut self, source: &mut impl Read, preserved: usize) -> Result<usize> {
        let n = source.read(&mut self.data[preserved..self.capacity])?;
        self.filled = preserved + n;
        Ok(n)
    }

    /// Moves the trailing partial field `[from, filled)` to the front of the
    /// buffer, so the next `refill` can append new bytes right after it.
    /// Returns the number of bytes preserved. Fails with `FieldTooLarge` if
    /// the unterminated field spans the entire buffer.
    pub fn compact(&mut self, from: usize) -> Result<usize> {
        if from == 0 && self.filled == self.capacity {
            return Err(Error::field_too_large(self.capacity));
        }
        let preserved = self.filled - from;
        self.data.copy_within(from..self.filled, 0);
        Ok(preserved)
    }
}
