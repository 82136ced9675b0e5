//! Reusable typed message instances.

use crate::codec::{FrameHeader, FRAME_HEADER_LEN};
use crate::{
    CodecError, MessageCapacity, MessageError, MessageKind, Payload, ValidationContext,
    ValidationError,
};
use bytes::BytesMut;
use meso_transport::{wire, Completion, Token, Transport};
use meso_types::{Pid, Tag};
use tracing::{error, trace};

/// Handle for an in-flight send.
#[derive(Debug)]
#[must_use = "a send token must be waited on"]
pub struct SendToken {
    token: Token,
    to: Pid,
}

impl SendToken {
    /// Destination rank.
    pub fn to(&self) -> Pid {
        self.to
    }
}

/// Handle for a posted receive.
#[derive(Debug)]
#[must_use = "a receive token must be waited on"]
pub struct ReceiveToken {
    token: Token,
    from: Pid,
    tag: Tag,
}

impl ReceiveToken {
    /// Source rank.
    pub fn from(&self) -> Pid {
        self.from
    }
}

/// A typed message reused across steps.
///
/// The payload is refilled every step. [`validate`](Self::validate) encodes
/// it into a frame; only a validated message can be sent, and any change to
/// the payload discards the frame.
#[derive(Debug, Clone)]
pub struct Message<P: Payload> {
    tag: Tag,
    owner: Pid,
    capacity: MessageCapacity,
    payload: P,
    frame: Option<Vec<u8>>,
}

impl<P: Payload> Message<P> {
    /// Create an empty message.
    pub fn new(tag: Tag, owner: Pid, capacity: MessageCapacity) -> Self {
        Self {
            tag,
            owner,
            capacity,
            payload: P::default(),
            frame: None,
        }
    }

    /// Message kind.
    pub fn kind(&self) -> MessageKind {
        P::KIND
    }

    /// Tag used for both sending and receiving.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Rank owning this instance.
    pub fn owner(&self) -> Pid {
        self.owner
    }

    /// Capacity limits.
    pub fn capacity(&self) -> MessageCapacity {
        self.capacity
    }

    /// Current payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Mutable payload. Discards any earlier validation.
    pub fn payload_mut(&mut self) -> &mut P {
        self.frame = None;
        &mut self.payload
    }

    /// Take the payload, leaving an empty one.
    pub fn take_payload(&mut self) -> P {
        self.frame = None;
        std::mem::take(&mut self.payload)
    }

    /// Store step-local data. No I/O happens here.
    pub fn set_payload(&mut self, payload: P) {
        self.frame = None;
        self.payload = payload;
    }

    /// Empty the payload, keeping allocations.
    pub fn clear(&mut self) {
        self.frame = None;
        self.payload.clear();
    }

    /// Whether the current payload passed validation.
    pub fn is_validated(&self) -> bool {
        self.frame.is_some()
    }

    /// Check the payload and envelope, then encode the frame.
    ///
    /// On failure the error is logged with the rank, kind and field, and the
    /// message stays unsendable.
    pub fn validate(&mut self, ctx: &ValidationContext) -> Result<(), ValidationError> {
        self.frame = None;
        match self.encode_checked(ctx) {
            Ok(frame) => {
                self.frame = Some(frame);
                Ok(())
            }
            Err(e) => {
                error!(
                    rank = ctx.rank.0,
                    kind = %P::KIND,
                    tag = self.tag.0,
                    field = e.field(),
                    error = %e,
                    "Message failed validation"
                );
                Err(e)
            }
        }
    }

    fn encode_checked(&self, ctx: &ValidationContext) -> Result<Vec<u8>, ValidationError> {
        ctx.check_rank("owner", self.owner)?;
        if let Some(peer) = ctx.peer {
            ctx.check_rank("peer", peer)?;
        }
        let count = self.payload.len();
        if count > self.capacity.max_elements {
            return Err(ValidationError::CapacityExceeded {
                kind: P::KIND,
                count,
                max: self.capacity.max_elements,
            });
        }
        self.payload.validate(ctx)?;

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN);
        FrameHeader {
            kind: P::KIND,
            tag: self.tag,
            sender: self.owner,
            count,
        }
        .encode(&mut buf);
        self.payload.encode(&mut buf);
        if buf.len() > self.capacity.max_bytes {
            return Err(ValidationError::ByteCapacityExceeded {
                kind: P::KIND,
                bytes: buf.len(),
                max: self.capacity.max_bytes,
            });
        }
        Ok(wire::compress(&buf))
    }

    fn validated_frame(&self) -> Result<Vec<u8>, MessageError> {
        self.frame.clone().ok_or(MessageError::NotValidated {
            kind: P::KIND,
            tag: self.tag,
        })
    }

    // ─── Synchronous ────────────────────────────────────────────────────

    /// Blocking send to `to`.
    pub fn send_to<T: Transport>(&self, transport: &T, to: Pid) -> Result<(), MessageError> {
        let frame = self.validated_frame()?;
        trace!(rank = self.owner.0, to = to.0, kind = %P::KIND, count = self.payload.len(), "Send");
        transport.send(to, self.tag, frame)?;
        Ok(())
    }

    /// Blocking send to the root rank.
    pub fn send_to_root<T: Transport>(&self, transport: &T) -> Result<(), MessageError> {
        self.send_to(transport, Pid::ROOT)
    }

    /// Blocking receive from `from`, replacing the payload.
    pub fn receive_from<T: Transport>(
        &mut self,
        transport: &T,
        from: Pid,
        ctx: &ValidationContext,
    ) -> Result<(), MessageError> {
        let frame = transport.recv(from, self.tag)?;
        self.accept_frame(&frame, from, self.tag, ctx)
    }

    /// Distribute the root's payload to every rank.
    ///
    /// On `root` the message must be validated and is sent to every other
    /// rank. Elsewhere the payload is replaced by the root's.
    pub fn broadcast<T: Transport>(
        &mut self,
        transport: &T,
        root: Pid,
        ctx: &ValidationContext,
    ) -> Result<(), MessageError> {
        if transport.rank() == root {
            let frame = self.validated_frame()?;
            for rank in 0..transport.world_size() as u32 {
                let peer = Pid(rank);
                if peer != root {
                    transport.send(peer, self.tag, frame.clone())?;
                }
            }
            Ok(())
        } else {
            self.receive_from(transport, root, ctx)
        }
    }

    // ─── Non-blocking ───────────────────────────────────────────────────

    /// Start a send to `to`.
    pub fn send_async<T: Transport>(
        &self,
        transport: &T,
        to: Pid,
    ) -> Result<SendToken, MessageError> {
        let frame = self.validated_frame()?;
        trace!(rank = self.owner.0, to = to.0, kind = %P::KIND, count = self.payload.len(), "Send async");
        let token = transport.isend(to, self.tag, frame)?;
        Ok(SendToken { token, to })
    }

    /// Post a receive from `from`.
    pub fn receive_async<T: Transport>(
        &self,
        transport: &T,
        from: Pid,
    ) -> Result<ReceiveToken, MessageError> {
        let token = transport.irecv(from, self.tag)?;
        Ok(ReceiveToken {
            token,
            from,
            tag: self.tag,
        })
    }

    /// Block until a send completes.
    pub fn wait_send<T: Transport>(
        &self,
        transport: &T,
        token: SendToken,
    ) -> Result<(), MessageError> {
        match transport.wait(token.token)? {
            Completion::Sent => Ok(()),
            Completion::Received(_) => Err(MessageError::CompletionMismatch),
        }
    }

    /// Block until a receive completes, then decode and validate it.
    ///
    /// The payload is sized to the received element count.
    pub fn wait_receive<T: Transport>(
        &mut self,
        transport: &T,
        token: ReceiveToken,
        ctx: &ValidationContext,
    ) -> Result<(), MessageError> {
        match transport.wait(token.token)? {
            Completion::Received(frame) => self.accept_frame(&frame, token.from, token.tag, ctx),
            Completion::Sent => Err(MessageError::CompletionMismatch),
        }
    }

    fn accept_frame(
        &mut self,
        frame: &[u8],
        from: Pid,
        tag: Tag,
        ctx: &ValidationContext,
    ) -> Result<(), MessageError> {
        self.frame = None;
        let payload = match self.decode_frame(frame, from, tag) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    rank = ctx.rank.0,
                    from = from.0,
                    kind = %P::KIND,
                    tag = tag.0,
                    error = %e,
                    "Received frame rejected"
                );
                return Err(e.into());
            }
        };
        if let Err(e) = payload.validate(ctx) {
            error!(
                rank = ctx.rank.0,
                from = from.0,
                kind = %P::KIND,
                field = e.field(),
                error = %e,
                "Received message failed validation"
            );
            return Err(e.into());
        }
        self.payload = payload;
        Ok(())
    }

    fn decode_frame(&self, frame: &[u8], from: Pid, tag: Tag) -> Result<P, CodecError> {
        let raw = wire::decompress_bounded(frame, self.capacity.max_bytes)?;
        let mut buf: &[u8] = &raw;
        let header = FrameHeader::decode(&mut buf)?;
        if header.kind != P::KIND {
            return Err(CodecError::KindMismatch {
                expected: P::KIND,
                found: header.kind,
            });
        }
        if header.tag != tag {
            return Err(CodecError::TagMismatch {
                expected: tag,
                found: header.tag,
            });
        }
        if header.sender != from {
            return Err(CodecError::SenderMismatch {
                expected: from,
                found: header.sender,
            });
        }
        if header.count > self.capacity.max_elements {
            return Err(CodecError::TooManyElements {
                count: header.count,
                max: self.capacity.max_elements,
            });
        }
        let payload = P::decode(header.count, &mut buf)?;
        if !buf.is_empty() {
            return Err(CodecError::TrailingBytes(buf.len()));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoordinateBundle, ForceBundle, ScalarAggregate};
    use glam::DVec3;
    use meso_transport_memory::{MemoryConfig, MemoryWorld};
    use meso_types::{BeadId, BeadKind};
    use tracing_test::traced_test;

    const CAP: MessageCapacity = MessageCapacity::new(16, 4096);

    fn ctx(rank: u32) -> ValidationContext {
        ValidationContext::new(Pid(rank), 2).with_extent(DVec3::splat(10.0))
    }

    #[test]
    fn test_unvalidated_send_rejected() {
        let endpoints = MemoryWorld::connect(2, MemoryConfig::default()).into_endpoints();
        let message: Message<ForceBundle> = Message::new(Tag(64), Pid(0), CAP);
        assert!(matches!(
            message.send_to(&endpoints[0], Pid(1)),
            Err(MessageError::NotValidated { .. })
        ));
    }

    #[test]
    fn test_payload_change_discards_validation() {
        let mut message: Message<ForceBundle> = Message::new(Tag(64), Pid(0), CAP);
        message.validate(&ctx(0)).unwrap();
        assert!(message.is_validated());
        message.payload_mut().push(BeadId(1), DVec3::ONE);
        assert!(!message.is_validated());
    }

    #[traced_test]
    #[test]
    fn test_over_capacity_rejected_not_truncated() {
        let mut message: Message<ForceBundle> =
            Message::new(Tag(64), Pid(0), MessageCapacity::new(2, 4096));
        for i in 0..3 {
            message.payload_mut().push(BeadId(i), DVec3::ZERO);
        }
        let err = message.validate(&ctx(0)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::CapacityExceeded {
                kind: MessageKind::Forces,
                count: 3,
                max: 2
            }
        );
        assert_eq!(message.payload().len(), 3);
        assert!(logs_contain("Message failed validation"));
    }

    #[test]
    fn test_byte_capacity_enforced() {
        let mut message: Message<ForceBundle> =
            Message::new(Tag(64), Pid(0), MessageCapacity::new(100, FRAME_HEADER_LEN + 32));
        message.payload_mut().push(BeadId(1), DVec3::ZERO);
        assert!(message.validate(&ctx(0)).is_ok());
        message.payload_mut().push(BeadId(2), DVec3::ZERO);
        assert!(matches!(
            message.validate(&ctx(0)),
            Err(ValidationError::ByteCapacityExceeded { .. })
        ));
    }

    #[test]
    fn test_async_exchange_sizes_payload_to_received_count() {
        let endpoints = MemoryWorld::connect(2, MemoryConfig::default()).into_endpoints();
        let mut outgoing: Message<CoordinateBundle> = Message::new(Tag(40), Pid(0), CAP);
        let mut incoming: Message<CoordinateBundle> = Message::new(Tag(40), Pid(1), CAP);
        incoming
            .payload_mut()
            .push(BeadId(99), BeadKind(0), DVec3::ONE, DVec3::ZERO);

        let recv = incoming.receive_async(&endpoints[1], Pid(0)).unwrap();
        outgoing
            .payload_mut()
            .push(BeadId(1), BeadKind(2), DVec3::new(9.5, 0.5, 0.5), DVec3::X);
        outgoing.validate(&ctx(0)).unwrap();
        let send = outgoing.send_async(&endpoints[0], Pid(1)).unwrap();

        outgoing.wait_send(&endpoints[0], send).unwrap();
        incoming.wait_receive(&endpoints[1], recv, &ctx(1)).unwrap();
        assert_eq!(incoming.payload().len(), 1);
        assert_eq!(incoming.payload().ids, vec![BeadId(1)]);
        assert!(!incoming.is_validated());
    }

    #[test]
    fn test_kind_mismatch_surfaces() {
        let endpoints = MemoryWorld::connect(2, MemoryConfig::default()).into_endpoints();
        let mut forces: Message<ForceBundle> = Message::new(Tag(5), Pid(0), CAP);
        forces.validate(&ctx(0)).unwrap();
        forces.send_to(&endpoints[0], Pid(1)).unwrap();

        let mut coords: Message<CoordinateBundle> = Message::new(Tag(5), Pid(1), CAP);
        let err = coords.receive_from(&endpoints[1], Pid(0), &ctx(1)).unwrap_err();
        assert!(matches!(
            err,
            MessageError::Codec(CodecError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_broadcast_reaches_every_rank() {
        let endpoints = MemoryWorld::connect(3, MemoryConfig::default()).into_endpoints();
        std::thread::scope(|s| {
            for endpoint in &endpoints {
                s.spawn(move || {
                    let rank = endpoint.rank();
                    let ctx = ValidationContext::new(rank, 3);
                    let mut message: Message<ScalarAggregate> = Message::new(Tag(191), rank, CAP);
                    if rank == Pid::ROOT {
                        message.set_payload(ScalarAggregate::from_counts(vec![42]));
                        message.validate(&ctx).unwrap();
                    }
                    message.broadcast(endpoint, Pid::ROOT, &ctx).unwrap();
                    assert_eq!(message.payload().counts, vec![42]);
                });
            }
        });
    }
}
