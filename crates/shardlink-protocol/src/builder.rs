//! Append-only writer for outbound frames.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{Framing, Serial};

/// Offset of the 2-byte length field in a length-prefixed frame.
const LENGTH_FIELD_OFFSET: usize = 1;

/// Largest total a 2-byte length field can declare.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// Builds the bytes of one outbound frame.
///
/// Integers are written big-endian. Text fields are one byte per
/// character. [`finish`](Self::finish) consumes the builder, so nothing can
/// be written after the frame is finalized.
#[derive(Debug, Default)]
pub struct ByteBuilder {
    buf: BytesMut,
    framing: Option<Framing>,
}

impl ByteBuilder {
    /// Creates an empty builder with no frame header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a frame: writes the opcode and, for length-prefixed frames,
    /// a placeholder length that `finish` patches.
    pub fn frame(opcode: u8, framing: Framing) -> Self {
        let capacity = match framing {
            Framing::Fixed(len) => usize::from(len),
            Framing::LengthPrefixed => 64,
        };
        let mut builder = Self {
            buf: BytesMut::with_capacity(capacity),
            framing: Some(framing),
        };
        builder.write_u8(opcode);
        if framing == Framing::LengthPrefixed {
            builder.write_u16(0);
        }
        builder
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current write offset, for a later [`patch_u16`](Self::patch_u16).
    pub fn mark(&self) -> usize {
        self.buf.len()
    }

    /// Overwrites a 2-byte big-endian field written earlier at `offset`.
    ///
    /// # Panics
    /// If `offset + 2` is past the bytes written so far.
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_serial(&mut self, serial: Serial) {
        self.write_u32(serial.raw());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Writes `text` into a field of exactly `len` bytes.
    ///
    /// Longer text is cut at `len` bytes; shorter text is zero-padded.
    /// Characters above U+00FF have no single-byte form and become `?`.
    pub fn write_fixed_text(&mut self, text: &str, len: usize) {
        let mut written = 0;
        for byte in text.chars().map(text_byte).take(len) {
            self.buf.put_u8(byte);
            written += 1;
        }
        self.buf.put_bytes(0, len - written);
    }

    /// Writes `text` followed by a single zero byte.
    pub fn write_terminated_text(&mut self, text: &str) {
        for byte in text.chars().map(text_byte) {
            self.buf.put_u8(byte);
        }
        self.buf.put_u8(0);
    }

    /// Finalizes the frame and returns its immutable bytes.
    ///
    /// Length-prefixed frames get their total length patched in here. A
    /// frame longer than [`MAX_FRAME_LEN`] is cut to that length so the
    /// declared total always matches the bytes sent.
    pub fn finish(mut self) -> Bytes {
        match self.framing {
            Some(Framing::LengthPrefixed) => {
                if self.buf.len() > MAX_FRAME_LEN {
                    tracing::warn!(
                        opcode = format_args!("0x{:02X}", self.buf[0]),
                        len = self.buf.len(),
                        max = MAX_FRAME_LEN,
                        "outbound frame truncated to the length field's range"
                    );
                    self.buf.truncate(MAX_FRAME_LEN);
                }
                let total = u16::try_from(self.buf.len()).unwrap_or(u16::MAX);
                self.patch_u16(LENGTH_FIELD_OFFSET, total);
            }
            Some(Framing::Fixed(len)) => {
                debug_assert_eq!(
                    self.buf.len(),
                    usize::from(len),
                    "fixed frame written with the wrong length"
                );
            }
            None => {}
        }
        self.buf.freeze()
    }
}

fn text_byte(c: char) -> u8 {
    u8::try_from(u32::from(c)).unwrap_or(b'?')
}
