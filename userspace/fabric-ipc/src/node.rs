// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-node context shared by the receive handler and the node task
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/host_fabric.rs`
//!
//! One [`NodeContext`] per simulated node replaces the process-wide buffers of
//! a bare-metal build, so several nodes can live in one test process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fabric_wire::CLASS_MP_SIMPLE;
use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::{
    HandlerError, Inbox, InboxConfig, InboxError, Message, NodeError, NodeId, Platform,
    ReceiveHandler, Sender, Sink, SlotBuffer, SlotDiscipline, Wait,
};

#[derive(Default)]
struct SignalInner {
    raised: AtomicBool,
    fault: Mutex<Option<HandlerError>>,
    gate: Mutex<()>,
    wake: Condvar,
}

/// Per-node stop flag, optionally carrying the fatal handler error that raised it.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<SignalInner>,
}

impl ShutdownSignal {
    /// Creates a signal that is not raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal and wakes every waiter.
    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        let _gate = self.inner.gate.lock();
        self.inner.wake.notify_all();
    }

    /// Records `err` (first one wins) and raises the signal.
    pub fn fail(&self, err: HandlerError) {
        {
            let mut fault = self.inner.fault.lock();
            if fault.is_none() {
                *fault = Some(err);
            }
        }
        self.raise();
    }

    /// Returns `true` once raised.
    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    /// Fatal handler error, if the node was failed.
    pub fn fault(&self) -> Option<HandlerError> {
        self.inner.fault.lock().clone()
    }

    /// Blocks until raised.
    pub fn wait(&self) {
        let mut gate = self.inner.gate.lock();
        while !self.is_raised() {
            self.inner.wake.wait(&mut gate);
        }
    }

    /// Blocks until raised or `timeout` elapses; returns whether it was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut gate = self.inner.gate.lock();
        while !self.is_raised() {
            if self.inner.wake.wait_until(&mut gate, deadline).timed_out() {
                break;
            }
        }
        self.is_raised()
    }
}

/// Buffering strategy requested for a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailboxKind {
    /// FIFO inbox.
    Queue(InboxConfig),
    /// Capacity-one slot buffer.
    Slot(SlotDiscipline),
}

impl Default for MailboxKind {
    fn default() -> Self {
        Self::Queue(InboxConfig::default())
    }
}

/// The buffer a node's receive handler delivers into.
#[derive(Clone)]
pub enum Mailbox {
    /// FIFO inbox.
    Queue(Arc<Inbox>),
    /// Capacity-one slot buffer.
    Slot(Arc<SlotBuffer>),
}

impl Mailbox {
    fn build(kind: MailboxKind, shutdown: &ShutdownSignal) -> Self {
        match kind {
            MailboxKind::Queue(config) => Self::Queue(Arc::new(Inbox::new(config))),
            MailboxKind::Slot(discipline) => {
                Self::Slot(Arc::new(SlotBuffer::new(discipline, shutdown.clone())))
            }
        }
    }

    fn sink(&self) -> Arc<dyn Sink> {
        match self {
            Self::Queue(inbox) => inbox.clone() as Arc<dyn Sink>,
            Self::Slot(slot) => slot.clone() as Arc<dyn Sink>,
        }
    }

    /// Returns `true` when nothing is waiting to be consumed.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Queue(inbox) => inbox.is_empty(),
            Self::Slot(slot) => !slot.is_available(),
        }
    }

    /// Number of messages consumed so far.
    pub fn consumed(&self) -> u64 {
        match self {
            Self::Queue(inbox) => inbox.stats().popped,
            Self::Slot(slot) => slot.deposits().saturating_sub(u64::from(slot.is_available())),
        }
    }

    /// Messages dropped by a bounded inbox.
    pub fn dropped(&self) -> u64 {
        match self {
            Self::Queue(inbox) => inbox.stats().dropped,
            Self::Slot(_) => 0,
        }
    }
}

/// Everything one node owns: identity, buffer, send handle, stop signal.
#[derive(Clone)]
pub struct NodeContext {
    id: NodeId,
    mailbox: Mailbox,
    sender: Sender,
    shutdown: ShutdownSignal,
}

impl NodeContext {
    /// Builds the node's buffer and registers its receive handler for class 0.
    pub fn attach(platform: Arc<dyn Platform>, kind: MailboxKind) -> Self {
        let id = platform.my_node_id();
        let shutdown = ShutdownSignal::new();
        let mailbox = Mailbox::build(kind, &shutdown);
        let handler = ReceiveHandler::new(id, mailbox.sink(), shutdown.clone());
        platform.register_receive_handler(CLASS_MP_SIMPLE, handler.into_callback());
        debug!("{id}: attached with {kind:?}");
        Self { id, mailbox, sender: Sender::new(platform), shutdown }
    }

    /// This node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's buffer.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// The FIFO inbox, when the node uses one.
    pub fn inbox(&self) -> Option<&Inbox> {
        match &self.mailbox {
            Mailbox::Queue(inbox) => Some(inbox.as_ref()),
            Mailbox::Slot(_) => None,
        }
    }

    /// The slot buffer, when the node uses one.
    pub fn slot(&self) -> Option<&SlotBuffer> {
        match &self.mailbox {
            Mailbox::Slot(slot) => Some(slot.as_ref()),
            Mailbox::Queue(_) => None,
        }
    }

    /// Send handle.
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Sends a signed value to `dest`.
    pub fn send(&self, dest: NodeId, opcode: u32, value: i32) {
        self.sender.send_value(dest, opcode, value);
    }

    /// Removes the next message, waiting for one to arrive.
    pub fn pop_blocking(&self) -> Result<Message, InboxError> {
        self.recv(Wait::Blocking)
    }

    /// Removes the next message if one is present.
    pub fn pop_nonblocking(&self) -> Result<Message, InboxError> {
        self.recv(Wait::NonBlocking)
    }

    /// Receives according to `wait`. Slot buffers are polled.
    pub fn recv(&self, wait: Wait) -> Result<Message, InboxError> {
        match &self.mailbox {
            Mailbox::Queue(inbox) => inbox.recv(wait),
            Mailbox::Slot(slot) => {
                let deadline = wait.timeout().map(|timeout| Instant::now() + timeout);
                loop {
                    if let Some(msg) = slot.take() {
                        return Ok(msg);
                    }
                    if self.shutdown.is_raised() {
                        return Err(InboxError::Shutdown);
                    }
                    if wait.is_non_blocking() {
                        return Err(InboxError::QueueEmpty);
                    }
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Err(InboxError::Timeout);
                    }
                    core::hint::spin_loop();
                    thread::yield_now();
                }
            }
        }
    }

    /// Stop signal shared with the receive handler.
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Returns `true` once the node was asked to stop or failed.
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_raised()
    }

    /// Asks the node to stop. Queued messages remain poppable until drained.
    pub fn stop(&self) {
        self.shutdown.raise();
        self.mailbox.sink().close();
    }

    /// Exit status a task reports once its loop ends.
    pub fn exit_status(&self) -> Result<(), NodeError> {
        match self.shutdown.fault() {
            Some(fault) => Err(NodeError::Handler(fault)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_wait_returns_after_raise() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            thread::spawn(move || signal.wait())
        };
        thread::sleep(Duration::from_millis(10));
        signal.raise();
        waiter.join().unwrap();
        assert!(signal.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn signal_wait_timeout_expires() {
        let signal = ShutdownSignal::new();
        assert!(!signal.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn first_fault_wins() {
        let signal = ShutdownSignal::new();
        let first = HandlerError::AllocationFailure { node: NodeId::new(1), cause: InboxError::QueueFull };
        signal.fail(first.clone());
        signal.fail(HandlerError::AllocationFailure { node: NodeId::new(9), cause: InboxError::QueueFull });
        assert_eq!(signal.fault(), Some(first));
        assert!(signal.is_raised());
    }
}
