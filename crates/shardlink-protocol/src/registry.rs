//! Opcode → parser lookup table.
//!
//! The registry is the only way raw frames become typed messages. It is
//! built once before any traffic flows and is read-only afterwards, so a
//! single `Arc<PacketRegistry>` can serve every connection at once.

use std::collections::HashMap;

use crate::packets::server::{
    CharacterCityListPacket, LoginCompletePacket, PlayMusicPacket,
    RemoveEntityPacket,
};
use crate::{ByteCursor, Framing, InboundPacket, ProtocolError, ServerMessage};

/// Turns a body cursor into a message.
type Factory = fn(&mut ByteCursor<'_>) -> Result<ServerMessage, ProtocolError>;

/// What the registry knows about one opcode.
#[derive(Clone, Copy)]
struct Entry {
    name: &'static str,
    framing: Framing,
    factory: Factory,
}

/// Maps inbound opcodes to their framing and parser.
#[derive(Clone, Default)]
pub struct PacketRegistry {
    entries: HashMap<u8, Entry>,
}

impl PacketRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every inbound packet type this crate defines.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.insert::<CharacterCityListPacket>();
        registry.insert::<PlayMusicPacket>();
        registry.insert::<RemoveEntityPacket>();
        registry.insert::<LoginCompletePacket>();
        registry
    }

    /// Registers `T` under its opcode.
    ///
    /// # Errors
    /// [`ProtocolError::DuplicateOpcode`] if the opcode is already taken.
    pub fn register<T: InboundPacket>(&mut self) -> Result<(), ProtocolError> {
        if self.entries.contains_key(&T::OPCODE) {
            return Err(ProtocolError::DuplicateOpcode(T::OPCODE));
        }
        self.insert::<T>();
        Ok(())
    }

    /// Callers guarantee `T::OPCODE` is free.
    fn insert<T: InboundPacket>(&mut self) {
        debug_assert!(!self.entries.contains_key(&T::OPCODE));
        self.entries.insert(
            T::OPCODE,
            Entry {
                name: T::NAME,
                framing: T::FRAMING,
                factory: parse_into::<T>,
            },
        );
        tracing::debug!(
            opcode = format_args!("0x{:02X}", T::OPCODE),
            name = T::NAME,
            "registered inbound packet"
        );
    }

    /// Framing for `opcode`, or `None` if it is not registered.
    pub fn framing(&self, opcode: u8) -> Option<Framing> {
        self.entries.get(&opcode).map(|e| e.framing)
    }

    /// Diagnostic name for `opcode`.
    pub fn name(&self, opcode: u8) -> Option<&'static str> {
        self.entries.get(&opcode).map(|e| e.name)
    }

    pub fn contains(&self, opcode: u8) -> bool {
        self.entries.contains_key(&opcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses one frame body (header already stripped) into a message.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownOpcode`]: nothing registered for `opcode`
    /// - any error the packet's parser raises
    /// - [`ProtocolError::UnconsumedBytes`]: the parser stopped short of
    ///   the end of the body
    pub fn construct(
        &self,
        opcode: u8,
        body: &[u8],
    ) -> Result<ServerMessage, ProtocolError> {
        let entry = self
            .entries
            .get(&opcode)
            .ok_or(ProtocolError::UnknownOpcode(opcode))?;

        let mut cursor = ByteCursor::new(body);
        let message = (entry.factory)(&mut cursor)?;

        if !cursor.is_empty() {
            return Err(ProtocolError::UnconsumedBytes {
                opcode,
                remaining: cursor.remaining(),
            });
        }
        Ok(message)
    }
}

fn parse_into<T: InboundPacket>(
    cursor: &mut ByteCursor<'_>,
) -> Result<ServerMessage, ProtocolError> {
    T::parse(cursor).map(Into::into)
}

impl std::fmt::Debug for PacketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut opcodes: Vec<_> = self.entries.keys().copied().collect();
        opcodes.sort_unstable();
        f.debug_struct("PacketRegistry")
            .field("opcodes", &opcodes)
            .finish()
    }
}
