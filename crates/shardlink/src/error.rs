//! Unified error type for Shardlink.

use std::time::Duration;

use shardlink_protocol::ProtocolError;
use shardlink_session::SessionError;
use shardlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `shardlink` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ShardlinkError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (framing, parsing, registry setup). Framing
    /// and parsing failures on a live connection arrive here too, lifted
    /// out of the session that detected them.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (failed, closed, backlog).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The client configuration could not be loaded or is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The shard sent nothing within the read timeout.
    #[error("no data from shard within {0:?}")]
    Timeout(Duration),
}

impl ShardlinkError {
    /// Converts a session error, reporting protocol failures as
    /// [`ShardlinkError::Protocol`].
    pub fn from_session(err: SessionError) -> Self {
        match err {
            SessionError::Protocol(e) => Self::Protocol(e),
            other => Self::Session(other),
        }
    }
}
