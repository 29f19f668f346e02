use mle_formats::Endian;

use crate::error::{LoadError, Result};
use crate::varint;

/// Forward-only, bounds-checked reader over one chunk of playprint bytes.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ByteCursor<'a> {
    pub fn new(bytes: &'a [u8], endian: Endian) -> Self {
        ByteCursor {
            bytes,
            pos: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Moves the cursor to the end of the buffer, ending any dispatch loop.
    pub fn skip_to_end(&mut self) {
        self.pos = self.bytes.len();
    }

    pub fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let byte = self.peek_byte().ok_or_else(|| self.out_of_bounds(1))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Borrows the next `len` bytes without copying them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(self.out_of_bounds(len));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads four bytes in the stream's byte order.
    pub fn read_fixed_i32(&mut self) -> Result<i32> {
        let bytes = self.read_bytes(4)?;
        Ok(self.endian.read_i32(bytes))
    }

    /// Decodes a varint index. Stops in front of the first byte with the
    /// high bit set, or at the end of the buffer.
    pub fn read_var_index(&mut self) -> Result<u32> {
        let start = self.pos;
        let mut value = 0u32;
        while let Some(byte) = self.peek_byte() {
            if !varint::is_group_byte(byte) {
                break;
            }
            value = varint::accumulate(value, byte)
                .ok_or(LoadError::IndexOverflow { offset: start })?;
            self.pos += 1;
        }
        if value > varint::MAX_INDEX {
            return Err(LoadError::IndexOverflow { offset: start });
        }
        Ok(value)
    }

    fn out_of_bounds(&self, needed: usize) -> LoadError {
        LoadError::OutOfBoundsRead {
            offset: self.pos,
            needed,
            len: self.bytes.len(),
        }
    }
}
