//! The per-connection session: receive bytes, decode messages, queue sends.
//!
//! A session is the client's record of one shard connection. It tracks:
//! - the framing state of everything received so far
//! - decoded messages not yet taken by the caller
//! - encoded requests not yet written to the transport
//! - whether the connection is still usable

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use shardlink_protocol::{
    DEFAULT_RECEIVE_CAPACITY, FrameAssembler, OutboundPacket, Packet,
    PacketRegistry, ServerMessage,
};
use tracing::{debug, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::error::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Limits for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Initial capacity of the receive buffer, in bytes.
    pub receive_capacity: usize,

    /// How many undrained messages the queue may hold when new bytes
    /// arrive. Appending to a session whose queue has reached this limit
    /// fails with [`SessionError::Backlog`]. One append may queue more than
    /// the limit, so how reads happen to be split never matters.
    ///
    /// `0` disables the queue: messages go to the dispatcher only and
    /// [`Session::poll_message`] always returns `None`.
    pub max_pending_messages: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            receive_capacity: DEFAULT_RECEIVE_CAPACITY,
            max_pending_messages: 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a session.
///
/// ```text
///   Active ──(bad frame)──→ Failed
///     │                       │
///     └──────(close)──────────┴──→ Closed
/// ```
///
/// Both `Failed` and `Closed` are terminal for incoming data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Failed { reason: String },
    Closed,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One shard connection's protocol state.
///
/// The session performs no I/O. The caller feeds it received bytes with
/// [`append`](Self::append) and writes out whatever
/// [`take_outgoing`](Self::take_outgoing) returns.
#[derive(Debug)]
pub struct Session {
    assembler: FrameAssembler,
    dispatcher: Dispatcher,
    pending: VecDeque<ServerMessage>,
    outgoing: VecDeque<Bytes>,
    state: SessionState,
    config: SessionConfig,
    received: u64,
}

impl Session {
    pub fn new(registry: Arc<PacketRegistry>, config: SessionConfig) -> Self {
        Self {
            assembler: FrameAssembler::with_capacity(
                registry,
                config.receive_capacity,
            ),
            dispatcher: Dispatcher::new(),
            pending: VecDeque::new(),
            outgoing: VecDeque::new(),
            state: SessionState::Active,
            config,
            received: 0,
        }
    }

    /// Feeds bytes received from the transport.
    ///
    /// Every message completed by these bytes is dispatched to the
    /// registered handlers and queued for [`poll_message`](Self::poll_message).
    /// Returns how many messages were completed.
    ///
    /// On a framing or parse error the messages completed before the bad
    /// frame are still delivered, and the session becomes
    /// [`Failed`](SessionState::Failed).
    ///
    /// # Errors
    /// [`SessionError::Backlog`] if the caller left `max_pending_messages`
    /// messages undrained since earlier appends. Nothing from `data` is
    /// decoded or dispatched in that case.
    pub fn append(&mut self, data: &[u8]) -> Result<usize, SessionError> {
        self.ensure_active()?;
        self.ensure_drained()?;
        self.assembler.extend(data);

        let mut completed = 0;
        loop {
            match self.assembler.next_message() {
                Ok(Some(message)) => {
                    self.deliver(message);
                    completed += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    self.fail(e.to_string());
                    return Err(SessionError::Protocol(e));
                }
            }
        }

        trace!(
            bytes = data.len(),
            completed,
            buffered = self.assembler.buffered(),
            "session append"
        );
        Ok(completed)
    }

    fn ensure_drained(&mut self) -> Result<(), SessionError> {
        let limit = self.config.max_pending_messages;
        if limit > 0 && self.pending.len() >= limit {
            let pending = self.pending.len();
            self.fail(format!("{pending} undelivered messages pending"));
            return Err(SessionError::Backlog { limit });
        }
        Ok(())
    }

    /// Every decoded message reaches both the handlers and the queue.
    fn deliver(&mut self, message: ServerMessage) {
        self.received += 1;
        let handlers = self.dispatcher.dispatch(&message);
        debug!(
            opcode = format_args!("0x{:02X}", message.opcode()),
            name = message.name(),
            handlers,
            "message received"
        );

        if self.config.max_pending_messages > 0 {
            self.pending.push_back(message);
        }
    }

    /// Takes the oldest undelivered message, if any.
    pub fn poll_message(&mut self) -> Option<ServerMessage> {
        self.pending.pop_front()
    }

    /// Number of decoded messages waiting in the queue.
    pub fn pending_messages(&self) -> usize {
        self.pending.len()
    }

    /// Queues an encoded request for the transport.
    ///
    /// Refused once the session is no longer active.
    pub fn send<P: OutboundPacket>(
        &mut self,
        packet: &P,
    ) -> Result<(), SessionError> {
        self.ensure_active()?;
        debug!(
            opcode = format_args!("0x{:02X}", packet.opcode()),
            name = packet.name(),
            len = packet.bytes().len(),
            "request queued"
        );
        self.outgoing.push_back(packet.bytes().clone());
        Ok(())
    }

    /// Drains every queued request, oldest first.
    pub fn take_outgoing(&mut self) -> Vec<Bytes> {
        self.outgoing.drain(..).collect()
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Handler registration for decoded messages.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Closes the session. Buffered partial frames and unsent requests are
    /// dropped; already decoded messages stay available.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if !self.outgoing.is_empty() {
            debug!(dropped = self.outgoing.len(), "unsent requests dropped");
            self.outgoing.clear();
        }
        self.assembler.reset();
        self.state = SessionState::Closed;
        debug!(received = self.received, "session closed");
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Total messages decoded over the session's life.
    pub fn messages_received(&self) -> u64 {
        self.received
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match &self.state {
            SessionState::Active => Ok(()),
            SessionState::Failed { reason } => Err(SessionError::Failed {
                reason: reason.clone(),
            }),
            SessionState::Closed => Err(SessionError::Closed),
        }
    }

    fn fail(&mut self, reason: String) {
        warn!(%reason, received = self.received, "session failed");
        self.state = SessionState::Failed { reason };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use shardlink_protocol::{
        ByteBuilder, GameLoginPacket, PacketKind, PlayMusicPacket,
        ProtocolError, RemoveEntityPacket, RequestNoticePacket, Serial,
    };

    use super::*;

    fn session() -> Session {
        Session::new(
            Arc::new(PacketRegistry::standard()),
            SessionConfig::default(),
        )
    }

    fn music(id: i16) -> Bytes {
        let mut b = ByteBuilder::frame(
            PlayMusicPacket::OPCODE,
            PlayMusicPacket::FRAMING,
        );
        b.write_i16(id);
        b.finish()
    }

    #[test]
    fn test_append_queues_messages_in_arrival_order() {
        let mut s = session();
        let mut chunk = music(1).to_vec();
        chunk.extend_from_slice(&music(2));

        assert_eq!(s.append(&chunk), Ok(2));
        assert_eq!(
            s.poll_message(),
            Some(PlayMusicPacket { music_id: 1 }.into())
        );
        assert_eq!(
            s.poll_message(),
            Some(PlayMusicPacket { music_id: 2 }.into())
        );
        assert_eq!(s.poll_message(), None);
        assert_eq!(s.messages_received(), 2);
    }

    #[test]
    fn test_append_partial_frame_completes_later() {
        let mut s = session();
        let frame = music(7);

        assert_eq!(s.append(&frame[..2]), Ok(0));
        assert_eq!(s.append(&frame[2..]), Ok(1));
        assert_eq!(
            s.poll_message(),
            Some(PlayMusicPacket { music_id: 7 }.into())
        );
    }

    #[test]
    fn test_append_dispatches_to_typed_handlers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut s = session();
        let sink = Arc::clone(&seen);
        s.dispatcher_mut().on::<RemoveEntityPacket, _>(move |p| {
            sink.lock().unwrap().push(p.serial);
        });

        let mut b = ByteBuilder::frame(
            RemoveEntityPacket::OPCODE,
            RemoveEntityPacket::FRAMING,
        );
        b.write_serial(Serial::new(0x4000_0010));
        s.append(&b.finish()).unwrap();
        s.append(&music(3)).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Serial::new(0x4000_0010)]);
    }

    #[test]
    fn test_append_unknown_opcode_fails_session() {
        let mut s = session();
        let mut chunk = music(1).to_vec();
        chunk.push(0x0B);

        let result = s.append(&chunk);

        assert_eq!(
            result,
            Err(SessionError::Protocol(ProtocolError::ProtocolDesync {
                opcode: 0x0B
            }))
        );
        // The frame ahead of the bad one was still delivered.
        assert_eq!(
            s.poll_message(),
            Some(PlayMusicPacket { music_id: 1 }.into())
        );
        assert!(matches!(s.state(), SessionState::Failed { .. }));
        assert!(matches!(
            s.append(&music(2)),
            Err(SessionError::Failed { .. })
        ));
    }

    fn limited(max_pending_messages: usize) -> Session {
        Session::new(
            Arc::new(PacketRegistry::standard()),
            SessionConfig {
                max_pending_messages,
                ..SessionConfig::default()
            },
        )
    }

    #[test]
    fn test_append_one_chunk_beyond_limit_is_accepted() {
        let mut s = limited(1024);
        let stream: Vec<u8> =
            (0..1100).flat_map(|i| music(i).to_vec()).collect();

        assert_eq!(s.append(&stream), Ok(1100));
        assert!(s.is_active());
        assert_eq!(s.pending_messages(), 1100);
    }

    #[test]
    fn test_append_split_or_whole_gives_same_result() {
        let stream: Vec<u8> =
            (0..1100).flat_map(|i| music(i).to_vec()).collect();

        let mut one_chunk = limited(1024);
        one_chunk.append(&stream).unwrap();
        let whole: Vec<_> =
            std::iter::from_fn(|| one_chunk.poll_message()).collect();

        let mut split = limited(1024);
        let mut drained = Vec::new();
        for chunk in stream.chunks(1500) {
            split.append(chunk).unwrap();
            drained.extend(std::iter::from_fn(|| split.poll_message()));
        }

        assert_eq!(whole.len(), 1100);
        assert_eq!(drained, whole);
    }

    #[test]
    fn test_append_to_undrained_full_queue_fails_session() {
        let mut s = limited(2);
        let stream = [music(1), music(2), music(3)].concat();
        assert_eq!(s.append(&stream), Ok(3));

        assert_eq!(
            s.append(&music(4)),
            Err(SessionError::Backlog { limit: 2 })
        );
        assert_eq!(s.pending_messages(), 3);
        assert!(!s.is_active());
    }

    #[test]
    fn test_append_backlog_dispatches_nothing_new() {
        let count = Arc::new(Mutex::new(0));
        let mut s = limited(1);
        let sink = Arc::clone(&count);
        s.dispatcher_mut().on_any(move |_| *sink.lock().unwrap() += 1);
        s.append(&music(1)).unwrap();

        assert!(s.append(&music(2)).is_err());

        // Handlers and the queue saw the same single message.
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(s.pending_messages(), 1);
    }

    #[test]
    fn test_append_after_draining_keeps_session_alive() {
        let mut s = limited(1);
        s.append(&music(1)).unwrap();
        assert!(s.poll_message().is_some());

        assert_eq!(s.append(&music(2)), Ok(1));
        assert!(s.is_active());
    }

    #[test]
    fn test_append_without_queue_only_dispatches() {
        let count = Arc::new(Mutex::new(0));
        let mut s = Session::new(
            Arc::new(PacketRegistry::standard()),
            SessionConfig {
                max_pending_messages: 0,
                ..SessionConfig::default()
            },
        );
        let sink = Arc::clone(&count);
        s.dispatcher_mut().on_any(move |_| *sink.lock().unwrap() += 1);

        let stream: Vec<u8> = (0..50).flat_map(|i| music(i).to_vec()).collect();

        assert_eq!(s.append(&stream), Ok(50));
        assert_eq!(*count.lock().unwrap(), 50);
        assert_eq!(s.poll_message(), None);
    }

    #[test]
    fn test_send_queues_encoded_bytes_in_order() {
        let mut s = session();
        let login = GameLoginPacket::new(7, "alice", "secret");
        let notice = RequestNoticePacket::new(0);

        s.send(&login).unwrap();
        s.send(&notice).unwrap();

        let out = s.take_outgoing();
        assert_eq!(out, vec![login.bytes().clone(), notice.bytes().clone()]);
        assert!(!s.has_outgoing());
    }

    #[test]
    fn test_close_rejects_further_io() {
        let mut s = session();
        s.send(&RequestNoticePacket::new(0)).unwrap();
        s.append(&music(1)[..1]).unwrap();

        s.close();

        assert_eq!(s.state(), &SessionState::Closed);
        assert!(s.take_outgoing().is_empty());
        assert_eq!(s.append(&music(1)), Err(SessionError::Closed));
        assert_eq!(
            s.send(&RequestNoticePacket::new(0)),
            Err(SessionError::Closed)
        );
    }

    #[test]
    fn test_close_keeps_already_decoded_messages() {
        let mut s = session();
        s.append(&music(4)).unwrap();

        s.close();

        assert_eq!(
            s.poll_message(),
            Some(PlayMusicPacket { music_id: 4 }.into())
        );
    }
}
