//! Error types for the protocol layer.
//!
//! Every variant here is fatal for the frame it was raised on, and all but
//! `DuplicateOpcode` are fatal for the connection: once one frame has been
//! misread, nothing after it in the stream can be trusted.

/// Errors that can occur while framing, parsing, or registering packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A read asked for more bytes than the buffer holds.
    ///
    /// The assembler only hands complete frames to the parsers, so seeing
    /// this means a parser and its declared framing disagree.
    #[error("frame truncated: needed {needed} bytes, {remaining} remaining")]
    FrameTruncated { needed: usize, remaining: usize },

    /// No factory is registered for this opcode.
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    /// The stream produced an opcode whose framing is unknown, so the
    /// length of everything that follows is unknowable.
    #[error("protocol desynchronized at opcode 0x{opcode:02X}")]
    ProtocolDesync { opcode: u8 },

    /// A decoded value violates the field's domain, e.g. a count implying
    /// more records than the frame can hold.
    #[error("malformed field `{field}`: {reason}")]
    MalformedField { field: &'static str, reason: String },

    /// The parser finished but left body bytes unread.
    #[error("opcode 0x{opcode:02X} left {remaining} body bytes unread")]
    UnconsumedBytes { opcode: u8, remaining: usize },

    /// Two packet types were registered under the same opcode.
    #[error("opcode 0x{0:02X} registered twice")]
    DuplicateOpcode(u8),
}
