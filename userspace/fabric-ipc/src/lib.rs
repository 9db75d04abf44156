// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Message-passing substrate for compute-fabric nodes (inbox, handler, send)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + `tests/inbox_concurrency.rs`, `tests/host_fabric.rs`, `tests/slot_race.rs`
//!
//! PUBLIC API:
//!   - Inbox: per-node FIFO drained with blocking and non-blocking receives
//!   - SlotBuffer: single-slot shared buffer written field by field
//!   - ReceiveHandler: decodes arriving packets and delivers them to a sink
//!   - Sender: encodes and transmits packets (fire and forget)
//!   - Platform trait + HostFabric: the platform runtime and its in-process backend
//!   - NodeContext: per-node state bundle shared by the handler and the task
//!
//! The receive handler runs on the platform's delivery context, never on the
//! task thread. Nothing here adds flow control, acknowledgements or ordering
//! beyond FIFO within one inbox.
//!
//! DEPENDENCIES:
//!   - fabric-wire: packet layout
//!   - parking_lot: inbox lock + condition variable, fabric registries
//!   - rand: seeded delivery jitter in the host fabric

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use core::fmt;
use core::time::Duration;

mod error;
pub mod fabric;
pub mod handler;
pub mod inbox;
pub mod message;
pub mod node;
pub mod platform;
pub mod send;
pub mod slot;

pub use error::{HandlerError, InboxError, NodeError};
pub use fabric::{FabricConfig, FabricStats, HostFabric, HostPort, Jitter};
pub use handler::{ReceiveHandler, Sink};
pub use inbox::{Inbox, InboxConfig, InboxStats, OverflowPolicy, WaitStrategy};
pub use message::{Message, Payload};
pub use node::{Mailbox, MailboxKind, NodeContext, ShutdownSignal};
pub use platform::{Platform, ReceiveCallback};
pub use send::Sender;
pub use slot::{SlotBuffer, SlotDiscipline, SlotView, UNWRITTEN_LEN};

/// Identity of a node on the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(transparent))]
pub struct NodeId(u8);

impl NodeId {
    /// Wraps a raw node id.
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Returns the raw id as carried in the packet header.
    pub const fn raw(self) -> u8 {
        self.0
    }
}

impl From<u8> for NodeId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

/// Behaviour of a receive call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until a message arrives.
    Blocking,
    /// Return immediately if the inbox is empty.
    NonBlocking,
    /// Block until a message arrives or the timeout expires.
    Timeout(Duration),
}

impl Wait {
    /// Returns `true` when the caller requested a non-blocking attempt.
    pub const fn is_non_blocking(self) -> bool {
        matches!(self, Self::NonBlocking)
    }

    /// Converts a [`Wait::Timeout`] variant into its [`Duration`].
    pub const fn timeout(self) -> Option<Duration> {
        match self {
            Self::Timeout(duration) => Some(duration),
            Self::Blocking | Self::NonBlocking => None,
        }
    }
}
