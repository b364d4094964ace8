//! Server → client packets.
//!
//! Every type here is parsed once, from a cursor over exactly its frame
//! body, and is never mutated afterwards.

use serde::Serialize;

use crate::packet::ensure_records_fit;
use crate::{
    ByteCursor, Direction, Framing, InboundPacket, PacketKind, ProtocolError,
    Serial, ServerMessage,
};

/// Width of the name and password fields of a character entry.
pub const CHARACTER_FIELD_LEN: usize = 30;

/// Width of the city and area fields of a starting location.
pub const LOCATION_TEXT_LEN: usize = 31;

// ---------------------------------------------------------------------------
// CharacterCityListPacket (0xA9)
// ---------------------------------------------------------------------------

/// One character slot on the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterListEntry {
    pub name: String,
    pub password: String,
}

impl CharacterListEntry {
    /// Bytes one entry occupies on the wire.
    pub const WIRE_LEN: usize = CHARACTER_FIELD_LEN * 2;

    fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            name: cursor.read_fixed_text(CHARACTER_FIELD_LEN)?,
            password: cursor.read_fixed_text(CHARACTER_FIELD_LEN)?,
        })
    }

    /// A slot with an empty name holds no character.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// A city a new character may start in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartingLocation {
    pub index: u8,
    pub city: String,
    pub area: String,
}

impl StartingLocation {
    pub const WIRE_LEN: usize = 1 + LOCATION_TEXT_LEN * 2;

    fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            index: cursor.read_u8()?,
            city: cursor.read_fixed_text(LOCATION_TEXT_LEN)?,
            area: cursor.read_fixed_text(LOCATION_TEXT_LEN)?,
        })
    }
}

/// The account's characters and the available starting cities.
///
/// ```text
/// [0xA9][len: u16]
///   [char_count: u8]  char_count × [name: 30][password: 30]
///   [city_count: u8]  city_count × [index: u8][city: 31][area: 31]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterCityListPacket {
    pub characters: Vec<CharacterListEntry>,
    pub locations: Vec<StartingLocation>,
}

impl PacketKind for CharacterCityListPacket {
    const OPCODE: u8 = 0xA9;
    const NAME: &'static str = "Char/City List";
    const FRAMING: Framing = Framing::LengthPrefixed;
    const DIRECTION: Direction = Direction::ServerToClient;
}

impl InboundPacket for CharacterCityListPacket {
    fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        let count = usize::from(cursor.read_u8()?);
        ensure_records_fit(
            cursor,
            "characters",
            count,
            CharacterListEntry::WIRE_LEN,
        )?;
        let characters = (0..count)
            .map(|_| CharacterListEntry::parse(cursor))
            .collect::<Result<Vec<_>, _>>()?;

        let count = usize::from(cursor.read_u8()?);
        ensure_records_fit(cursor, "locations", count, StartingLocation::WIRE_LEN)?;
        let locations = (0..count)
            .map(|_| StartingLocation::parse(cursor))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            characters,
            locations,
        })
    }

    fn from_message(message: &ServerMessage) -> Option<&Self> {
        match message {
            ServerMessage::CharacterCityList(p) => Some(p),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayMusicPacket (0x6D)
// ---------------------------------------------------------------------------

/// Starts a music track.
///
/// ```text
/// [0x6D][music_id: i16]    3 bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayMusicPacket {
    pub music_id: i16,
}

impl PacketKind for PlayMusicPacket {
    const OPCODE: u8 = 0x6D;
    const NAME: &'static str = "Play Music";
    const FRAMING: Framing = Framing::Fixed(3);
    const DIRECTION: Direction = Direction::ServerToClient;
}

impl InboundPacket for PlayMusicPacket {
    fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            music_id: cursor.read_i16()?,
        })
    }

    fn from_message(message: &ServerMessage) -> Option<&Self> {
        match message {
            ServerMessage::PlayMusic(p) => Some(p),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// RemoveEntityPacket (0x1D)
// ---------------------------------------------------------------------------

/// Removes a mobile or item from the world.
///
/// ```text
/// [0x1D][serial: u32]    5 bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemoveEntityPacket {
    pub serial: Serial,
}

impl PacketKind for RemoveEntityPacket {
    const OPCODE: u8 = 0x1D;
    const NAME: &'static str = "Remove Entity";
    const FRAMING: Framing = Framing::Fixed(5);
    const DIRECTION: Direction = Direction::ServerToClient;
}

impl InboundPacket for RemoveEntityPacket {
    fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            serial: cursor.read_serial()?,
        })
    }

    fn from_message(message: &ServerMessage) -> Option<&Self> {
        match message {
            ServerMessage::RemoveEntity(p) => Some(p),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// LoginCompletePacket (0x55)
// ---------------------------------------------------------------------------

/// The server has sent the initial world state; the client may start.
///
/// ```text
/// [0x55]    1 byte, no body
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoginCompletePacket;

impl PacketKind for LoginCompletePacket {
    const OPCODE: u8 = 0x55;
    const NAME: &'static str = "Login Complete";
    const FRAMING: Framing = Framing::Fixed(1);
    const DIRECTION: Direction = Direction::ServerToClient;
}

impl InboundPacket for LoginCompletePacket {
    fn parse(_cursor: &mut ByteCursor<'_>) -> Result<Self, ProtocolError> {
        Ok(Self)
    }

    fn from_message(message: &ServerMessage) -> Option<&Self> {
        match message {
            ServerMessage::LoginComplete(p) => Some(p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ByteBuilder;

    fn location_body(index: u8, city: &str, area: &str) -> ByteBuilder {
        let mut b = ByteBuilder::new();
        b.write_u8(index);
        b.write_fixed_text(city, LOCATION_TEXT_LEN);
        b.write_fixed_text(area, LOCATION_TEXT_LEN);
        b
    }

    #[test]
    fn test_city_list_with_no_characters_and_one_location() {
        let mut b = ByteBuilder::new();
        b.write_u8(0);
        b.write_u8(1);
        b.write_bytes(&location_body(3, "Britain", "East").finish());
        let body = b.finish();

        let mut cursor = ByteCursor::new(&body);
        let packet = CharacterCityListPacket::parse(&mut cursor).unwrap();

        assert!(packet.characters.is_empty());
        assert_eq!(
            packet.locations,
            vec![StartingLocation {
                index: 3,
                city: "Britain".into(),
                area: "East".into(),
            }]
        );
        assert!(cursor.is_empty(), "parser must consume the whole body");
    }

    #[test]
    fn test_city_list_parses_characters_in_order() {
        let mut b = ByteBuilder::new();
        b.write_u8(2);
        b.write_fixed_text("Lord British", CHARACTER_FIELD_LEN);
        b.write_fixed_text("", CHARACTER_FIELD_LEN);
        b.write_fixed_text("", CHARACTER_FIELD_LEN);
        b.write_fixed_text("", CHARACTER_FIELD_LEN);
        b.write_u8(0);
        let body = b.finish();

        let mut cursor = ByteCursor::new(&body);
        let packet = CharacterCityListPacket::parse(&mut cursor).unwrap();

        assert_eq!(packet.characters.len(), 2);
        assert_eq!(packet.characters[0].name, "Lord British");
        assert!(!packet.characters[0].is_empty());
        assert!(packet.characters[1].is_empty());
        assert!(packet.locations.is_empty());
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_city_list_count_beyond_body_is_malformed() {
        // Claims 5 characters but carries none.
        let body = [5u8, 0];
        let mut cursor = ByteCursor::new(&body);

        let err = CharacterCityListPacket::parse(&mut cursor).unwrap_err();

        assert!(matches!(
            err,
            ProtocolError::MalformedField { field: "characters", .. }
        ));
    }

    #[test]
    fn test_city_list_missing_location_count_is_truncated() {
        let body = [0u8];
        let mut cursor = ByteCursor::new(&body);
        assert!(matches!(
            CharacterCityListPacket::parse(&mut cursor),
            Err(ProtocolError::FrameTruncated { .. })
        ));
    }

    #[test]
    fn test_play_music_reads_id() {
        let body = [0x00, 0x2A];
        let mut cursor = ByteCursor::new(&body);
        let packet = PlayMusicPacket::parse(&mut cursor).unwrap();
        assert_eq!(packet.music_id, 42);
    }

    #[test]
    fn test_remove_entity_reads_serial() {
        let body = [0x00, 0x00, 0x10, 0x01];
        let mut cursor = ByteCursor::new(&body);
        let packet = RemoveEntityPacket::parse(&mut cursor).unwrap();
        assert_eq!(packet.serial, Serial::new(0x1001));
        assert!(packet.serial.is_mobile());
    }

    #[test]
    fn test_from_message_matches_only_own_variant() {
        let message: ServerMessage = PlayMusicPacket { music_id: 1 }.into();
        assert!(PlayMusicPacket::from_message(&message).is_some());
        assert!(RemoveEntityPacket::from_message(&message).is_none());
    }
}
