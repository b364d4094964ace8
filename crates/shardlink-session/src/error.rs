//! Error types for the session layer.

use shardlink_protocol::ProtocolError;

/// Errors that can occur while driving a connection's session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Framing or parsing failed. The session is now
    /// [`Failed`](crate::SessionState::Failed).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session already failed; no more bytes will be interpreted.
    #[error("session failed earlier: {reason}")]
    Failed { reason: String },

    /// The session was closed.
    #[error("session closed")]
    Closed,

    /// Decoded messages piled up past the configured limit because
    /// nobody is draining them.
    #[error("{limit} undelivered messages pending")]
    Backlog { limit: usize },
}
