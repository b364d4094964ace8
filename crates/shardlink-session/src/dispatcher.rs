//! Typed callback registration for decoded messages.
//!
//! Consumers (game state, UI) subscribe to the packet types they care
//! about. The session owns the dispatcher and calls it once per message,
//! in the order messages arrived on the wire.

use std::collections::HashMap;

use shardlink_protocol::{InboundPacket, ServerMessage};

type Handler = Box<dyn FnMut(&ServerMessage) + Send>;

/// Routes each message to the handlers registered for its type.
///
/// For one message, typed handlers run first in registration order, then
/// the catch-all handlers in registration order.
#[derive(Default)]
pub struct Dispatcher {
    typed: HashMap<u8, Vec<Handler>>,
    any: Vec<Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `handler` for every `T` received.
    pub fn on<T, F>(&mut self, mut handler: F)
    where
        T: InboundPacket,
        F: FnMut(&T) + Send + 'static,
    {
        self.typed
            .entry(T::OPCODE)
            .or_default()
            .push(Box::new(move |message| {
                if let Some(packet) = T::from_message(message) {
                    handler(packet);
                }
            }));
    }

    /// Calls `handler` for every message, whatever its type.
    pub fn on_any<F>(&mut self, handler: F)
    where
        F: FnMut(&ServerMessage) + Send + 'static,
    {
        self.any.push(Box::new(handler));
    }

    /// Delivers one message. Returns how many handlers saw it.
    pub fn dispatch(&mut self, message: &ServerMessage) -> usize {
        use shardlink_protocol::Packet;

        let mut called = 0;
        if let Some(handlers) = self.typed.get_mut(&message.opcode()) {
            for handler in handlers.iter_mut() {
                handler(message);
                called += 1;
            }
        }
        for handler in self.any.iter_mut() {
            handler(message);
            called += 1;
        }
        called
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.typed.values().map(Vec::len).sum::<usize>() + self.any.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.len())
            .finish()
    }
}
