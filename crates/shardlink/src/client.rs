//! `ShardClient` builder and read loop.
//!
//! This is the entry point for talking to a shard. It ties together all
//! the layers: transport → session → protocol.

use std::sync::Arc;
use std::time::Duration;

use shardlink_protocol::{OutboundPacket, PacketRegistry, ServerMessage};
use shardlink_session::{Dispatcher, Session, SessionError, SessionState};
use shardlink_transport::{
    Connection, ConnectionId, TcpConnection, TransportError,
};
use tokio::sync::mpsc;

use crate::{ClientConfig, ShardlinkError};

/// Builder for configuring and connecting a [`ShardClient`].
///
/// # Example
///
/// ```rust,ignore
/// use shardlink::prelude::*;
///
/// let mut client = ShardClient::builder()
///     .server_addr("127.0.0.1:2593")
///     .connect()
///     .await?;
/// client.send(&GameLoginPacket::new(auth_id, "name", "password")).await?;
/// while let Some(message) = client.next_message().await? {
///     println!("{message:?}");
/// }
/// ```
#[derive(Debug, Default)]
pub struct ShardClientBuilder {
    config: ClientConfig,
    registry: Option<Arc<PacketRegistry>>,
}

impl ShardClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the shard address.
    pub fn server_addr(mut self, addr: &str) -> Self {
        self.config.server_addr = addr.to_string();
        self
    }

    /// Uses `registry` instead of [`PacketRegistry::standard`].
    ///
    /// The same registry may back any number of clients.
    pub fn registry(mut self, registry: Arc<PacketRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validates the configuration and opens a TCP connection.
    pub async fn connect(self) -> Result<ShardClient, ShardlinkError> {
        self.config.validate()?;
        let conn = TcpConnection::connect(&self.config.server_addr).await?;
        tracing::info!(
            id = %conn.id(),
            addr = %self.config.server_addr,
            "connected to shard"
        );
        Ok(self.build(conn))
    }

    /// Wraps an already-open connection.
    pub fn build<C>(self, conn: C) -> ShardClient<C>
    where
        C: Connection<Error = TransportError>,
    {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(PacketRegistry::standard()));
        ShardClient {
            session: Session::new(registry, self.config.session_config()),
            read_timeout: self.config.read_timeout(),
            conn,
            deferred: None,
        }
    }
}

/// A live connection to a shard.
pub struct ShardClient<C = TcpConnection> {
    conn: C,
    session: Session,
    read_timeout: Option<Duration>,
    /// A fatal error raised while messages ahead of it were still queued.
    deferred: Option<SessionError>,
}

impl ShardClient {
    /// Creates a new builder.
    pub fn builder() -> ShardClientBuilder {
        ShardClientBuilder::new()
    }
}

impl<C> ShardClient<C>
where
    C: Connection<Error = TransportError>,
{
    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    /// Handler registration; handlers run as bytes are decoded.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        self.session.dispatcher_mut()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Queues `packet`'s frame and writes every queued frame, in order.
    pub async fn send<P: OutboundPacket>(
        &mut self,
        packet: &P,
    ) -> Result<(), ShardlinkError> {
        self.session.send(packet)?;
        self.flush().await
    }

    async fn flush(&mut self) -> Result<(), ShardlinkError> {
        for frame in self.session.take_outgoing() {
            self.conn.send(&frame).await?;
        }
        Ok(())
    }

    /// Returns the next decoded message, reading from the shard as needed.
    ///
    /// `Ok(None)` means the shard closed the connection. Messages that
    /// arrived ahead of a bad frame are returned first; the error follows
    /// on the next call and the client is unusable afterwards.
    ///
    /// With `max_pending_messages` set to `0` nothing is queued, so this
    /// only returns at close or on error while handlers see every message.
    pub async fn next_message(
        &mut self,
    ) -> Result<Option<ServerMessage>, ShardlinkError> {
        loop {
            if let Some(message) = self.session.poll_message() {
                return Ok(Some(message));
            }
            if let Some(err) = self.deferred.take() {
                return Err(ShardlinkError::from_session(err));
            }
            match self.session.state() {
                SessionState::Active => {}
                SessionState::Closed => return Ok(None),
                SessionState::Failed { reason } => {
                    return Err(SessionError::Failed {
                        reason: reason.clone(),
                    }
                    .into());
                }
            }

            let Some(data) = self.read_chunk().await? else {
                tracing::info!(
                    id = %self.conn.id(),
                    received = self.session.messages_received(),
                    "shard closed the connection"
                );
                self.session.close();
                return Ok(None);
            };

            if let Err(e) = self.session.append(&data) {
                tracing::warn!(
                    id = %self.conn.id(),
                    error = %e,
                    "connection failed"
                );
                self.deferred = Some(e);
            }
        }
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>, ShardlinkError> {
        let Some(limit) = self.read_timeout else {
            return Ok(self.conn.recv().await?);
        };
        match tokio::time::timeout(limit, self.conn.recv()).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::info!(id = %self.conn.id(), "read timed out");
                Err(ShardlinkError::Timeout(limit))
            }
        }
    }

    /// Forwards every message to `tx` in arrival order until the shard
    /// closes, the receiver is dropped, or a fatal error occurs.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<ServerMessage>,
    ) -> Result<(), ShardlinkError> {
        tracing::info!(id = %self.conn.id(), "client read loop running");

        let result = loop {
            match self.next_message().await {
                Ok(Some(message)) => {
                    if tx.send(message).await.is_err() {
                        tracing::debug!(
                            id = %self.conn.id(),
                            "message receiver dropped"
                        );
                        break Ok(());
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = self.close().await {
            tracing::debug!(error = %e, "close after read loop failed");
        }
        result
    }

    /// Closes the session and the connection.
    pub async fn close(&mut self) -> Result<(), ShardlinkError> {
        self.session.close();
        self.conn.close().await?;
        tracing::info!(id = %self.conn.id(), "client closed");
        Ok(())
    }
}

impl<C: Connection> std::fmt::Debug for ShardClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardClient")
            .field("id", &self.conn.id())
            .field("session", &self.session)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}
