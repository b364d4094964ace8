//! Client → server packets.
//!
//! Each constructor writes the full frame immediately. The packet keeps only
//! the finalized bytes; there is nothing left to mutate.

use std::fmt;

use bytes::Bytes;

use crate::{ByteBuilder, Direction, Framing, OutboundPacket, PacketKind};

/// Width of the account name and password fields.
pub const CREDENTIAL_LEN: usize = 30;

/// Longest speech text sent; anything past it is dropped.
pub const MAX_SPEECH_TEXT: usize = 512;

/// Implements `Debug` without dumping the frame, which may hold
/// credentials.
macro_rules! opaque_debug {
    ($ty:ty) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("opcode", &format_args!("0x{:02X}", Self::OPCODE))
                    .field("len", &self.frame.len())
                    .finish()
            }
        }
    };
}

// ---------------------------------------------------------------------------
// GameLoginPacket (0x91)
// ---------------------------------------------------------------------------

/// Logs in to the game server after the login server handed over.
///
/// ```text
/// [0x91][auth_id: u32][username: 30][password: 30]    65 bytes
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct GameLoginPacket {
    frame: Bytes,
}

impl PacketKind for GameLoginPacket {
    const OPCODE: u8 = 0x91;
    const NAME: &'static str = "Game Server Login";
    const FRAMING: Framing = Framing::Fixed(65);
    const DIRECTION: Direction = Direction::ClientToServer;
}

impl GameLoginPacket {
    /// Credentials longer than 30 bytes are truncated.
    pub fn new(auth_id: u32, username: &str, password: &str) -> Self {
        let mut builder = ByteBuilder::frame(Self::OPCODE, Self::FRAMING);
        builder.write_u32(auth_id);
        builder.write_fixed_text(username, CREDENTIAL_LEN);
        builder.write_fixed_text(password, CREDENTIAL_LEN);
        Self {
            frame: builder.finish(),
        }
    }
}

impl OutboundPacket for GameLoginPacket {
    fn bytes(&self) -> &Bytes {
        &self.frame
    }
}

opaque_debug!(GameLoginPacket);

// ---------------------------------------------------------------------------
// RequestNoticePacket (0xA7)
// ---------------------------------------------------------------------------

/// Asks for the notice that follows `last_notice`.
///
/// ```text
/// [0xA7][last_notice: u16][0x01]    4 bytes
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct RequestNoticePacket {
    frame: Bytes,
}

impl PacketKind for RequestNoticePacket {
    const OPCODE: u8 = 0xA7;
    const NAME: &'static str = "Request Notice";
    const FRAMING: Framing = Framing::Fixed(4);
    const DIRECTION: Direction = Direction::ClientToServer;
}

impl RequestNoticePacket {
    const NEXT_NOTICE_FLAG: u8 = 0x01;

    pub fn new(last_notice: i16) -> Self {
        let mut builder = ByteBuilder::frame(Self::OPCODE, Self::FRAMING);
        builder.write_i16(last_notice);
        builder.write_u8(Self::NEXT_NOTICE_FLAG);
        Self {
            frame: builder.finish(),
        }
    }
}

impl OutboundPacket for RequestNoticePacket {
    fn bytes(&self) -> &Bytes {
        &self.frame
    }
}

opaque_debug!(RequestNoticePacket);

// ---------------------------------------------------------------------------
// SpeechRequestPacket (0x03)
// ---------------------------------------------------------------------------

/// Says something in the world.
///
/// ```text
/// [0x03][len: u16][mode: u8][hue: u16][font: u16][text ...][0x00]
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SpeechRequestPacket {
    frame: Bytes,
}

impl PacketKind for SpeechRequestPacket {
    const OPCODE: u8 = 0x03;
    const NAME: &'static str = "Speech Request";
    const FRAMING: Framing = Framing::LengthPrefixed;
    const DIRECTION: Direction = Direction::ClientToServer;
}

impl SpeechRequestPacket {
    pub fn new(mode: u8, hue: u16, font: u16, text: &str) -> Self {
        let text: String = text.chars().take(MAX_SPEECH_TEXT).collect();

        let mut builder = ByteBuilder::frame(Self::OPCODE, Self::FRAMING);
        builder.write_u8(mode);
        builder.write_u16(hue);
        builder.write_u16(font);
        builder.write_terminated_text(&text);
        Self {
            frame: builder.finish(),
        }
    }
}

impl OutboundPacket for SpeechRequestPacket {
    fn bytes(&self) -> &Bytes {
        &self.frame
    }
}

opaque_debug!(SpeechRequestPacket);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;

    /// Asserts the invariant every outbound frame shares: opcode first,
    /// length equal to what the framing declares.
    fn assert_framed<P: OutboundPacket>(packet: &P) {
        let bytes = packet.bytes();
        assert_eq!(bytes[0], packet.opcode());
        match packet.framing() {
            Framing::Fixed(len) => assert_eq!(bytes.len(), usize::from(len)),
            Framing::LengthPrefixed => {
                let declared = u16::from_be_bytes([bytes[1], bytes[2]]);
                assert_eq!(bytes.len(), usize::from(declared));
            }
        }
    }

    #[test]
    fn test_game_login_literal_layout() {
        let packet = GameLoginPacket::new(1, "alice", "secret");
        let bytes = packet.bytes();

        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], 0x91);
        assert_eq!(&bytes[1..5], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&bytes[5..10], b"alice");
        assert!(bytes[10..35].iter().all(|&b| b == 0));
        assert_eq!(&bytes[35..41], b"secret");
        assert!(bytes[41..65].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_game_login_truncates_long_credentials() {
        let long = "x".repeat(40);
        let packet = GameLoginPacket::new(7, &long, &long);
        let bytes = packet.bytes();

        assert_framed(&packet);
        assert!(bytes[5..35].iter().all(|&b| b == b'x'));
        assert!(bytes[35..65].iter().all(|&b| b == b'x'));
    }

    #[test]
    fn test_request_notice_layout() {
        let packet = RequestNoticePacket::new(0x0102);
        assert_eq!(&packet.bytes()[..], &[0xA7, 0x01, 0x02, 0x01]);
        assert_framed(&packet);
    }

    #[test]
    fn test_speech_request_length_covers_whole_frame() {
        let packet = SpeechRequestPacket::new(0, 0x0034, 3, "Hail");
        let bytes = packet.bytes();

        assert_framed(&packet);
        // 3 header + 5 fixed fields + "Hail" + terminator
        assert_eq!(bytes.len(), 13);
        assert_eq!(&bytes[..3], &[0x03, 0x00, 0x0D]);
        assert_eq!(&bytes[3..8], &[0x00, 0x00, 0x34, 0x00, 0x03]);
        assert_eq!(&bytes[8..], b"Hail\0");
    }

    #[test]
    fn test_speech_request_caps_text_length() {
        let text = "a".repeat(MAX_SPEECH_TEXT + 100);
        let packet = SpeechRequestPacket::new(0, 0, 0, &text);

        assert_framed(&packet);
        assert_eq!(packet.bytes().len(), 3 + 5 + MAX_SPEECH_TEXT + 1);
    }

    #[test]
    fn test_debug_does_not_leak_credentials() {
        let packet = GameLoginPacket::new(1, "alice", "hunter2");
        let rendered = format!("{packet:?}");
        assert!(rendered.contains("0x91"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_bytes_are_stable_across_calls() {
        let packet = RequestNoticePacket::new(5);
        let first = packet.bytes().clone();
        assert_eq!(&first, packet.bytes());
    }
}
