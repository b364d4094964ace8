//! # Shardlink
//!
//! Network core for a multiplayer world client.
//!
//! Shardlink turns the continuous byte stream a shard sends into typed,
//! validated messages, and typed requests into the exact bytes the shard
//! expects. Callers build packets and read
//! [`ServerMessage`](protocol::ServerMessage)s; framing,
//! fragmentation and dispatch are handled underneath.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shardlink::prelude::*;
//!
//! # async fn demo() -> Result<(), ShardlinkError> {
//! let mut client = ShardClient::builder()
//!     .server_addr("127.0.0.1:2593")
//!     .connect()
//!     .await?;
//!
//! client
//!     .dispatcher_mut()
//!     .on::<PlayMusicPacket, _>(|p| println!("music {}", p.music_id));
//! client.send(&GameLoginPacket::new(1, "name", "password")).await?;
//!
//! while let Some(message) = client.next_message().await? {
//!     println!("{message:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod logging;

pub use client::{ShardClient, ShardClientBuilder};
pub use config::ClientConfig;
pub use error::ShardlinkError;
pub use logging::init_tracing;

pub use shardlink_protocol as protocol;
pub use shardlink_session as session;
pub use shardlink_transport as transport;

/// Everything a typical client needs in one import.
pub mod prelude {
    pub use crate::{
        ClientConfig, ShardClient, ShardClientBuilder, ShardlinkError,
        init_tracing,
    };
    pub use shardlink_protocol::{
        ByteBuilder, ByteCursor, CharacterCityListPacket, CharacterListEntry,
        FrameAssembler, Framing, GameLoginPacket, InboundPacket,
        LoginCompletePacket, OutboundPacket, Packet, PacketKind,
        PacketRegistry, PlayMusicPacket, ProtocolError, RemoveEntityPacket,
        RequestNoticePacket, Serial, ServerMessage, SpeechRequestPacket,
        StartingLocation,
    };
    pub use shardlink_session::{
        Dispatcher, Session, SessionConfig, SessionError, SessionState,
    };
    pub use shardlink_transport::{
        Connection, ConnectionId, TcpConnection, TransportError,
    };
}
