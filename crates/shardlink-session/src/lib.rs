//! Connection session management for Shardlink.
//!
//! This crate owns everything a single shard connection needs between the
//! socket and the game:
//!
//! 1. **Receiving**: feeding raw bytes through a frame assembler
//!    ([`Session::append`])
//! 2. **Dispatch**: handing each decoded message to typed handlers
//!    ([`Dispatcher`]) and to a pull queue ([`Session::poll_message`])
//! 3. **Sending**: queueing encoded requests for the transport
//!    ([`Session::send`], [`Session::take_outgoing`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)  ← drives the socket, calls append / take_outgoing
//!     ↕
//! Session Layer (this crate)  ← framing state, handlers, queues
//!     ↕
//! Protocol Layer (below)  ← packet types, registry, assembler
//! ```
//!
//! A session never blocks and never touches the network.

mod dispatcher;
mod error;
mod session;

pub use dispatcher::Dispatcher;
pub use error::SessionError;
pub use session::{Session, SessionConfig, SessionState};
