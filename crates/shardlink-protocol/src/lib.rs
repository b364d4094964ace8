//! Wire protocol for Shardlink.
//!
//! This crate turns the bytes a shard sends into typed messages and typed
//! requests into the bytes a shard expects:
//!
//! - **Primitives** ([`ByteCursor`], [`ByteBuilder`]): big-endian integers
//!   and fixed-width, zero-padded text.
//! - **Identifiers** ([`Serial`]): 32-bit world-object ids.
//! - **Packets** ([`Packet`], [`OutboundPacket`], [`InboundPacket`],
//!   [`ServerMessage`]): one type per opcode, framed fixed-size or
//!   length-prefixed.
//! - **Dispatch** ([`PacketRegistry`]): opcode → parser table, built once.
//! - **Framing** ([`FrameAssembler`]): per-connection receive buffer that
//!   survives arbitrary TCP fragmentation and coalescing.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → FrameAssembler (frames) → PacketRegistry (ServerMessage)
//! caller → OutboundPacket::new(..) → ByteBuilder (Bytes) → Transport
//! ```
//!
//! Nothing here performs I/O or blocks.

mod assembler;
mod builder;
mod cursor;
mod error;
mod packet;
pub mod packets;
mod registry;
mod serial;

pub use assembler::{DEFAULT_RECEIVE_CAPACITY, Frame, FrameAssembler};
pub use builder::{ByteBuilder, MAX_FRAME_LEN};
pub use cursor::ByteCursor;
pub use error::ProtocolError;
pub use packet::{
    Direction, Framing, InboundPacket, LENGTH_PREFIXED_HEADER, OutboundPacket,
    Packet, PacketKind,
};
pub use packets::ServerMessage;
pub use packets::client::{
    GameLoginPacket, RequestNoticePacket, SpeechRequestPacket,
};
pub use packets::server::{
    CharacterCityListPacket, CharacterListEntry, LoginCompletePacket,
    PlayMusicPacket, RemoveEntityPacket, StartingLocation,
};
pub use registry::PacketRegistry;
pub use serial::{Serial, SerialKind};
