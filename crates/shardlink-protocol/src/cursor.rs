//! Bounds-checked reader over a received frame body.

use crate::{ProtocolError, Serial};

/// A sequential cursor over a byte slice.
///
/// All multi-byte integers are big-endian. A read that would run off the
/// end fails with [`ProtocolError::FrameTruncated`] and leaves the position
/// where it was.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrows the next `len` bytes and advances past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::FrameTruncated {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.data[start..self.pos])
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.read_array().map(i16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.read_array().map(u32::from_be_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.read_array().map(i32::from_be_bytes)
    }

    pub fn read_serial(&mut self) -> Result<Serial, ProtocolError> {
        self.read_u32().map(Serial::new)
    }

    /// Reads a fixed-width, zero-padded text field of exactly `len` bytes.
    ///
    /// Each byte is one character (byte value = code point). The result
    /// stops at the first zero byte; the padding after it is consumed but
    /// not returned.
    pub fn read_fixed_text(&mut self, len: usize) -> Result<String, ProtocolError> {
        let raw = self.read_bytes(len)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Ok(raw[..end].iter().map(|&b| char::from(b)).collect())
    }
}
