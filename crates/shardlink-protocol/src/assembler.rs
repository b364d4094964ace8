//! Receive buffer and framing state machine for one connection.
//!
//! TCP delivers a byte stream, not packets: one read may hold half a frame
//! or five of them. The assembler accumulates whatever arrives and cuts it
//! into complete frames using each opcode's [`Framing`].
//!
//! ```text
//!                ┌──────────── frame sliced out ◄────────────┐
//!                ▼                                            │
//!   AwaitingOpcode ──(fixed)───────────────────────► AwaitingBody
//!        │   │                                            ▲
//!        │   └──(length-prefixed)──► AwaitingLength ──────┘
//!        │                                │
//!        └──(unknown opcode)──┐           └──(length < 3)──┐
//!                             ▼                            ▼
//!                          Desynchronized  (terminal)
//! ```
//!
//! Once desynchronized the assembler refuses all further input: with one
//! frame's length unknown, every later byte could belong anywhere. Every
//! later call reports the error that caused it, and not even
//! [`reset`](FrameAssembler::reset) leaves that state.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};

use crate::packet::LENGTH_PREFIXED_HEADER;
use crate::{Framing, PacketRegistry, ProtocolError, ServerMessage};

/// Default receive buffer capacity.
pub const DEFAULT_RECEIVE_CAPACITY: usize = 64 * 1024;

/// One complete frame with its header stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingOpcode,
    /// Opcode consumed; the two length bytes have not all arrived.
    AwaitingLength { opcode: u8 },
    /// Header consumed; `remaining` body bytes still to come.
    AwaitingBody { opcode: u8, remaining: usize },
    Desynchronized { opcode: u8 },
}

/// Cuts a connection's byte stream into frames.
///
/// Owned by exactly one connection. Not `Sync`-shared: all pushes for a
/// connection happen on one logical thread of control.
#[derive(Debug)]
pub struct FrameAssembler {
    registry: Arc<PacketRegistry>,
    buffer: BytesMut,
    state: State,
    /// The error that desynchronized the stream.
    failure: Option<ProtocolError>,
}

impl FrameAssembler {
    pub fn new(registry: Arc<PacketRegistry>) -> Self {
        Self::with_capacity(registry, DEFAULT_RECEIVE_CAPACITY)
    }

    pub fn with_capacity(registry: Arc<PacketRegistry>, capacity: usize) -> Self {
        Self {
            registry,
            buffer: BytesMut::with_capacity(capacity),
            state: State::AwaitingOpcode,
            failure: None,
        }
    }

    /// The registry this assembler frames against.
    pub fn registry(&self) -> &Arc<PacketRegistry> {
        &self.registry
    }

    /// Appends newly arrived bytes without extracting anything.
    ///
    /// Input is dropped once the assembler is desynchronized.
    pub fn extend(&mut self, data: &[u8]) {
        if !self.is_desynchronized() {
            self.buffer.extend_from_slice(data);
        }
    }

    /// Appends `data` and extracts every frame now complete.
    ///
    /// Bytes of a frame that has not fully arrived stay buffered for the
    /// next call.
    ///
    /// When a frame fails after others completed in the same call, those
    /// frames are returned and the failure is reported by the next call.
    /// The assembler is already desynchronized at that point
    /// ([`is_desynchronized`](Self::is_desynchronized)).
    ///
    /// # Errors
    /// [`ProtocolError::ProtocolDesync`] on an opcode with unknown framing
    /// and [`ProtocolError::MalformedField`] on an impossible length. Both
    /// are terminal.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>, ProtocolError> {
        self.extend(data);
        drain(|| self.next_frame())
    }

    /// Appends `data` and parses every complete frame through the registry,
    /// in arrival order.
    ///
    /// Failures are reported the same way as for [`push`](Self::push).
    pub fn decode(
        &mut self,
        data: &[u8],
    ) -> Result<Vec<ServerMessage>, ProtocolError> {
        self.extend(data);
        drain(|| self.next_message())
    }

    /// Parses the next complete frame, if one is buffered.
    ///
    /// A parse failure is as fatal as a framing failure: the assembler
    /// desynchronizes.
    pub fn next_message(
        &mut self,
    ) -> Result<Option<ServerMessage>, ProtocolError> {
        let Some(frame) = self.next_frame()? else {
            return Ok(None);
        };

        match self.registry.construct(frame.opcode, &frame.body) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                tracing::warn!(
                    opcode = format_args!("0x{:02X}", frame.opcode),
                    error = %e,
                    "frame failed to parse"
                );
                Err(self.desynchronize(frame.opcode, e))
            }
        }
    }

    /// Extracts the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            match self.state {
                State::AwaitingOpcode => {
                    let Some(&opcode) = self.buffer.first() else {
                        return Ok(None);
                    };
                    self.buffer.advance(1);

                    self.state = match self.registry.framing(opcode) {
                        Some(Framing::Fixed(total)) => State::AwaitingBody {
                            opcode,
                            remaining: usize::from(total).saturating_sub(1),
                        },
                        Some(Framing::LengthPrefixed) => {
                            State::AwaitingLength { opcode }
                        }
                        None => {
                            tracing::warn!(
                                opcode = format_args!("0x{opcode:02X}"),
                                buffered = self.buffer.len(),
                                "unknown opcode, stream desynchronized"
                            );
                            return Err(self.desynchronize(
                                opcode,
                                ProtocolError::ProtocolDesync { opcode },
                            ));
                        }
                    };
                }

                State::AwaitingLength { opcode } => {
                    if self.buffer.len() < 2 {
                        return Ok(None);
                    }
                    let total = usize::from(self.buffer.get_u16());

                    if total < LENGTH_PREFIXED_HEADER {
                        tracing::warn!(
                            opcode = format_args!("0x{opcode:02X}"),
                            total,
                            "frame length shorter than its own header"
                        );
                        let error = ProtocolError::MalformedField {
                            field: "length",
                            reason: format!(
                                "total length {total} is less than the \
                                 {LENGTH_PREFIXED_HEADER}-byte header"
                            ),
                        };
                        return Err(self.desynchronize(opcode, error));
                    }

                    self.state = State::AwaitingBody {
                        opcode,
                        remaining: total - LENGTH_PREFIXED_HEADER,
                    };
                }

                State::AwaitingBody { opcode, remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }
                    let body = self.buffer.split_to(remaining).freeze();
                    self.state = State::AwaitingOpcode;

                    tracing::trace!(
                        opcode = format_args!("0x{opcode:02X}"),
                        body_len = body.len(),
                        surplus = self.buffer.len(),
                        "frame ready"
                    );
                    return Ok(Some(Frame { opcode, body }));
                }

                State::Desynchronized { opcode } => {
                    return Err(self
                        .failure
                        .clone()
                        .unwrap_or(ProtocolError::ProtocolDesync { opcode }));
                }
            }
        }
    }

    fn desynchronize(
        &mut self,
        opcode: u8,
        error: ProtocolError,
    ) -> ProtocolError {
        self.buffer.clear();
        self.state = State::Desynchronized { opcode };
        self.failure = Some(error.clone());
        error
    }

    /// Discards any partially assembled frame.
    ///
    /// Used when a connection is torn down mid-frame; the partial frame is
    /// never delivered. A desynchronized assembler stays desynchronized.
    pub fn reset(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                discarded = self.buffer.len(),
                state = self.state_name(),
                "discarding partial frame"
            );
        }
        self.buffer.clear();
        if !self.is_desynchronized() {
            self.state = State::AwaitingOpcode;
        }
    }

    /// Bytes received but not yet handed out as frames (header bytes that
    /// were already consumed are not counted).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_desynchronized(&self) -> bool {
        matches!(self.state, State::Desynchronized { .. })
    }

    /// `true` when no frame is partway through assembly.
    pub fn is_idle(&self) -> bool {
        self.state == State::AwaitingOpcode && self.buffer.is_empty()
    }

    /// Current state, for diagnostics.
    pub fn state_name(&self) -> &'static str {
        match self.state {
            State::AwaitingOpcode => "AwaitingOpcode",
            State::AwaitingLength { .. } => "AwaitingLength",
            State::AwaitingBody { .. } => "AwaitingBody",
            State::Desynchronized { .. } => "Desynchronized",
        }
    }
}

/// Collects items until `next` runs dry. An error is returned only when
/// nothing was collected before it.
fn drain<T>(
    mut next: impl FnMut() -> Result<Option<T>, ProtocolError>,
) -> Result<Vec<T>, ProtocolError> {
    let mut items = Vec::new();
    loop {
        match next() {
            Ok(Some(item)) => items.push(item),
            Ok(None) => return Ok(items),
            Err(e) if items.is_empty() => return Err(e),
            Err(_) => return Ok(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::server::PlayMusicPacket;

    fn assembler() -> FrameAssembler {
        FrameAssembler::new(Arc::new(PacketRegistry::standard()))
    }

    #[test]
    fn test_push_fixed_frame_in_one_chunk() {
        let mut asm = assembler();

        let frames = asm.push(&[0x6D, 0x00, 0x2A]).unwrap();

        assert_eq!(
            frames,
            vec![Frame {
                opcode: 0x6D,
                body: Bytes::from_static(&[0x00, 0x2A]),
            }]
        );
        assert!(asm.is_idle());
    }

    #[test]
    fn test_push_waits_for_opcode_length_and_body() {
        let mut asm = assembler();

        assert!(asm.push(&[0xA9]).unwrap().is_empty());
        assert_eq!(asm.state_name(), "AwaitingLength");

        assert!(asm.push(&[0x00]).unwrap().is_empty());
        assert_eq!(asm.state_name(), "AwaitingLength");

        // total 5 → body is 2 bytes
        assert!(asm.push(&[0x05, 0x00]).unwrap().is_empty());
        assert_eq!(asm.state_name(), "AwaitingBody");

        let frames = asm.push(&[0x00]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, 0xA9);
        assert_eq!(&frames[0].body[..], &[0x00, 0x00]);
        assert_eq!(asm.state_name(), "AwaitingOpcode");
    }

    #[test]
    fn test_push_keeps_surplus_for_next_frame() {
        let mut asm = assembler();

        let frames = asm.push(&[0x6D, 0x00, 0x01, 0x1D, 0x00]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(asm.state_name(), "AwaitingBody");

        let frames = asm.push(&[0x00, 0x00, 0x07]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].opcode, 0x1D);
        assert_eq!(&frames[0].body[..], &[0x00, 0x00, 0x00, 0x07]);
    }

    #[test]
    fn test_push_zero_body_frame_completes_immediately() {
        let mut asm = assembler();
        let frames = asm.push(&[0x55, 0x55]).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.body.is_empty()));
    }

    #[test]
    fn test_push_unknown_opcode_desynchronizes() {
        let mut asm = assembler();

        let result = asm.push(&[0xEE, 0x6D, 0x00, 0x01]);

        assert_eq!(result, Err(ProtocolError::ProtocolDesync { opcode: 0xEE }));
        assert!(asm.is_desynchronized());
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn test_push_after_desync_ignores_new_bytes() {
        let mut asm = assembler();
        let _ = asm.push(&[0xEE]);

        // A perfectly valid frame must not be parsed after the desync.
        let result = asm.push(&[0x6D, 0x00, 0x01]);

        assert_eq!(result, Err(ProtocolError::ProtocolDesync { opcode: 0xEE }));
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn test_push_length_below_header_is_malformed() {
        let mut asm = assembler();

        let result = asm.push(&[0xA9, 0x00, 0x02]);

        assert!(matches!(
            result,
            Err(ProtocolError::MalformedField { field: "length", .. })
        ));
        assert!(asm.is_desynchronized());
    }

    #[test]
    fn test_decode_returns_typed_messages_in_order() {
        let mut asm = assembler();

        let messages = asm
            .decode(&[0x6D, 0x00, 0x01, 0x6D, 0x00, 0x02])
            .unwrap();

        assert_eq!(
            messages,
            vec![
                PlayMusicPacket { music_id: 1 }.into(),
                PlayMusicPacket { music_id: 2 }.into(),
            ]
        );
    }

    #[test]
    fn test_next_message_parse_failure_desynchronizes() {
        let mut asm = assembler();
        // Length-prefixed city list whose body is only a count of 9.
        asm.extend(&[0xA9, 0x00, 0x04, 0x09]);

        let result = asm.next_message();

        assert!(matches!(result, Err(ProtocolError::MalformedField { .. })));
        assert!(asm.is_desynchronized());
    }

    #[test]
    fn test_push_returns_frames_completed_before_failure() {
        let mut asm = assembler();

        let frames = asm.push(&[0x6D, 0x00, 0x01, 0xEE]).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(asm.is_desynchronized());
        assert_eq!(
            asm.push(&[]),
            Err(ProtocolError::ProtocolDesync { opcode: 0xEE })
        );
    }

    #[test]
    fn test_decode_returns_messages_completed_before_failure() {
        let mut asm = assembler();

        let messages = asm
            .decode(&[0x6D, 0x00, 0x01, 0x6D, 0x00, 0x02, 0xEE])
            .unwrap();

        assert_eq!(
            messages,
            vec![
                PlayMusicPacket { music_id: 1 }.into(),
                PlayMusicPacket { music_id: 2 }.into(),
            ]
        );
        assert_eq!(
            asm.decode(&[0x6D, 0x00, 0x03]),
            Err(ProtocolError::ProtocolDesync { opcode: 0xEE })
        );
    }

    #[test]
    fn test_decode_parse_failure_is_reported_on_every_later_call() {
        let mut asm = assembler();
        // A music frame, then a city list whose count of 9 has no records.
        let messages = asm
            .decode(&[0x6D, 0x00, 0x01, 0xA9, 0x00, 0x04, 0x09])
            .unwrap();
        assert_eq!(messages.len(), 1);

        for _ in 0..2 {
            assert!(matches!(
                asm.decode(&[]),
                Err(ProtocolError::MalformedField { .. })
            ));
        }
    }

    #[test]
    fn test_reset_after_desync_stays_desynchronized() {
        let mut asm = assembler();
        let _ = asm.push(&[0xEE]);

        asm.reset();

        assert!(asm.is_desynchronized());
        assert_eq!(
            asm.decode(&[0x6D, 0x00, 0x01]),
            Err(ProtocolError::ProtocolDesync { opcode: 0xEE })
        );
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut asm = assembler();
        asm.push(&[0x1D, 0x00, 0x00]).unwrap();
        assert!(!asm.is_idle());

        asm.reset();

        assert!(asm.is_idle());
        let frames = asm.push(&[0x6D, 0x00, 0x09]).unwrap();
        assert_eq!(frames[0].opcode, 0x6D);
    }
}
