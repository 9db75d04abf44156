// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Receive handler invoked by the platform for each arriving packet
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below
//!
//! ERROR CONDITIONS:
//!   - HandlerError::Malformed: packet shorter than three words, discarded
//!   - HandlerError::AllocationFailure: sink refused the message; the node is
//!     failed and stopped (there is no backpressure path)

use std::sync::Arc;

use fabric_wire::Packet;
use log::{error, trace, warn};

use crate::{
    HandlerError, Inbox, InboxError, Message, NodeId, ReceiveCallback, ShutdownSignal, SlotBuffer,
};

/// Destination of decoded messages.
pub trait Sink: Send + Sync {
    /// Stores `msg` for the node task. Must not wait on the task.
    fn deliver(&self, msg: Message) -> Result<(), InboxError>;

    /// Stops accepting messages and wakes blocked consumers.
    fn close(&self);
}

impl Sink for Inbox {
    fn deliver(&self, msg: Message) -> Result<(), InboxError> {
        self.push(msg)
    }

    fn close(&self) {
        Inbox::close(self);
    }
}

impl Sink for SlotBuffer {
    fn deliver(&self, msg: Message) -> Result<(), InboxError> {
        self.deposit(&msg)
    }

    fn close(&self) {}
}

/// Decodes packets and delivers them to the node's sink.
pub struct ReceiveHandler {
    node: NodeId,
    sink: Arc<dyn Sink>,
    shutdown: ShutdownSignal,
}

impl ReceiveHandler {
    /// Creates a handler for `node`. Fatal failures are reported on `shutdown`.
    pub fn new(node: NodeId, sink: Arc<dyn Sink>, shutdown: ShutdownSignal) -> Self {
        Self { node, sink, shutdown }
    }

    /// Handles one packet.
    pub fn on_packet(&self, words: &[u32]) -> Result<(), HandlerError> {
        let packet = match Packet::decode(words) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("{}: discarding packet: {err}", self.node);
                return Err(HandlerError::Malformed(err));
            }
        };
        let msg = Message::from_packet(&packet);
        trace!(
            "{}: msg received from {} type {} data {}",
            self.node,
            msg.source,
            msg.opcode,
            msg.value()
        );
        match self.sink.deliver(msg) {
            Ok(()) => Ok(()),
            Err(InboxError::Shutdown) => {
                trace!("{}: node stopping; message discarded", self.node);
                Ok(())
            }
            Err(cause) => {
                let err = HandlerError::AllocationFailure { node: self.node, cause };
                error!("{err}");
                self.shutdown.fail(err.clone());
                self.sink.close();
                Err(err)
            }
        }
    }

    /// Wraps the handler into a platform callback.
    pub fn into_callback(self) -> ReceiveCallback {
        Arc::new(move |words: &[u32]| {
            let _ = self.on_packet(words);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OverflowPolicy;
    use fabric_wire::{Packet, PacketError};

    #[test]
    fn decodes_into_inbox() {
        let inbox = Arc::new(Inbox::unbounded());
        let handler = ReceiveHandler::new(NodeId::new(1), inbox.clone(), ShutdownSignal::new());
        handler.on_packet(&Packet::new(1, 0, 0, 100).encode()).unwrap();
        let msg = inbox.pop_nonblocking().unwrap();
        assert_eq!(msg, Message::new(NodeId::new(0), 0, 100));
    }

    #[test]
    fn malformed_packet_is_discarded() {
        let inbox = Arc::new(Inbox::unbounded());
        let shutdown = ShutdownSignal::new();
        let handler = ReceiveHandler::new(NodeId::new(1), inbox.clone(), shutdown.clone());
        assert_eq!(handler.on_packet(&[0]), Err(HandlerError::Malformed(PacketError::Truncated(1))));
        assert!(inbox.is_empty());
        assert!(!shutdown.is_raised(), "malformed traffic is not fatal");
    }

    #[test]
    fn full_inbox_fails_the_node() {
        let inbox = Arc::new(Inbox::bounded(1, OverflowPolicy::Reject));
        let shutdown = ShutdownSignal::new();
        let handler = ReceiveHandler::new(NodeId::new(2), inbox.clone(), shutdown.clone());
        let words = Packet::new(2, 0, 0, 1).encode();
        handler.on_packet(&words).unwrap();
        let err = handler.on_packet(&words).unwrap_err();
        let expected =
            HandlerError::AllocationFailure { node: NodeId::new(2), cause: InboxError::QueueFull };
        assert_eq!(err, expected);
        assert!(shutdown.is_raised());
        assert_eq!(shutdown.fault(), Some(expected));
        assert!(inbox.is_closed());
        assert_eq!(inbox.pop_blocking().unwrap().word(), 1, "queued message survives");
    }
}
