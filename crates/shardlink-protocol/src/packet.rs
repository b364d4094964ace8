//! The contracts every packet type fulfils.
//!
//! A packet is identified by a one-byte opcode and framed one of two ways:
//!
//! ```text
//! Fixed(n)          [opcode][body .................]      n bytes total
//! LengthPrefixed    [opcode][len_hi][len_lo][body ...]    len bytes total
//! ```
//!
//! The length in a length-prefixed frame counts the whole frame, opcode and
//! length field included, so the body is `len - 3` bytes.

use std::fmt::Debug;

use bytes::Bytes;

use crate::{ByteCursor, ProtocolError, ServerMessage};

/// Size of the opcode plus the length field of a length-prefixed frame.
pub const LENGTH_PREFIXED_HEADER: usize = 3;

/// How the end of a frame is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Framing {
    /// Every frame of this opcode is exactly this many bytes, opcode
    /// included.
    Fixed(u16),
    /// A 2-byte big-endian total length follows the opcode.
    LengthPrefixed,
}

impl Framing {
    /// Bytes between the opcode and the body.
    pub fn header_len(self) -> usize {
        match self {
            Self::Fixed(_) => 1,
            Self::LengthPrefixed => LENGTH_PREFIXED_HEADER,
        }
    }
}

/// Which way a packet travels. Opcodes are unique within one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// Static description of one packet type.
pub trait PacketKind {
    const OPCODE: u8;
    /// Diagnostic label for logs. Never transmitted.
    const NAME: &'static str;
    const FRAMING: Framing;
    const DIRECTION: Direction;
}

/// Behaviour shared by inbound and outbound packets.
pub trait Packet {
    fn opcode(&self) -> u8;
    fn name(&self) -> &'static str;
    fn framing(&self) -> Framing;
}

impl<T: PacketKind> Packet for T {
    fn opcode(&self) -> u8 {
        T::OPCODE
    }

    fn name(&self) -> &'static str {
        T::NAME
    }

    fn framing(&self) -> Framing {
        T::FRAMING
    }
}

/// A packet the client sends.
///
/// Implementors build their frame once, in their constructor, and keep
/// the finalized bytes. `bytes` never re-encodes.
pub trait OutboundPacket: Packet + Debug + Send + Sync {
    /// The complete frame, header through body.
    fn bytes(&self) -> &Bytes;
}

/// A packet the client receives.
pub trait InboundPacket:
    PacketKind + Debug + Clone + Send + Sync + Into<ServerMessage> + 'static
{
    /// Parses the body from a cursor positioned just past the header.
    ///
    /// Reads exactly the fields of the wire format, in order. The
    /// [`PacketRegistry`](crate::PacketRegistry) rejects any body bytes the
    /// parser leaves behind.
    fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ProtocolError>;

    /// Borrows this packet type out of a decoded message, if it matches.
    fn from_message(message: &ServerMessage) -> Option<&Self>;
}

/// Fails with [`ProtocolError::MalformedField`] unless `count` records of
/// `record_len` bytes fit in what the cursor has left.
pub(crate) fn ensure_records_fit(
    cursor: &ByteCursor<'_>,
    field: &'static str,
    count: usize,
    record_len: usize,
) -> Result<(), ProtocolError> {
    let needed = count * record_len;
    if needed > cursor.remaining() {
        return Err(ProtocolError::MalformedField {
            field,
            reason: format!(
                "{count} records need {needed} bytes, {} remaining",
                cursor.remaining()
            ),
        });
    }
    Ok(())
}
