//! Concrete packet types, split by direction.

pub mod client;
pub mod server;

use serde::Serialize;

use crate::{Framing, Packet, PacketKind};
use server::{
    CharacterCityListPacket, LoginCompletePacket, PlayMusicPacket,
    RemoveEntityPacket,
};

/// Declares the closed set of inbound messages: one variant per opcode,
/// plus the `From` conversions and per-variant `Packet` dispatch.
macro_rules! server_messages {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        /// Every message the server can send, fully parsed.
        ///
        /// `#[serde(tag = "type")]` keeps the JSON form flat, which is what
        /// the diagnostic dumps print.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
        #[serde(tag = "type")]
        pub enum ServerMessage {
            $($variant($ty),)+
        }

        $(
            impl From<$ty> for ServerMessage {
                fn from(packet: $ty) -> Self {
                    Self::$variant(packet)
                }
            }
        )+

        impl Packet for ServerMessage {
            fn opcode(&self) -> u8 {
                match self {
                    $(Self::$variant(_) => <$ty as PacketKind>::OPCODE,)+
                }
            }

            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$ty as PacketKind>::NAME,)+
                }
            }

            fn framing(&self) -> Framing {
                match self {
                    $(Self::$variant(_) => <$ty as PacketKind>::FRAMING,)+
                }
            }
        }
    };
}

server_messages! {
    CharacterCityList(CharacterCityListPacket),
    PlayMusic(PlayMusicPacket),
    RemoveEntity(RemoveEntityPacket),
    LoginComplete(LoginCompletePacket),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Serial;

    #[test]
    fn test_server_message_reports_variant_opcode_and_name() {
        let message: ServerMessage = RemoveEntityPacket {
            serial: Serial::new(0x4000_0001),
        }
        .into();

        assert_eq!(message.opcode(), 0x1D);
        assert_eq!(message.name(), "Remove Entity");
        assert_eq!(message.framing(), Framing::Fixed(5));
    }

    #[test]
    fn test_server_message_json_is_internally_tagged() {
        let message: ServerMessage = PlayMusicPacket { music_id: 7 }.into();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "PlayMusic");
        assert_eq!(json["music_id"], 7);
    }
}
