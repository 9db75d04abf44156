// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by the inbox, the receive handler and node tasks.

use fabric_wire::PacketError;
use thiserror::Error;

use crate::NodeId;

/// Errors produced by receive calls and bounded pushes.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum InboxError {
    /// Non-blocking receive found nothing. Expected; poll again or block.
    #[error("queue empty")]
    QueueEmpty,
    /// Bounded inbox is at capacity and configured to reject.
    #[error("queue full")]
    QueueFull,
    /// Timed receive expired without a message.
    #[error("receive timed out")]
    Timeout,
    /// The node is shutting down and the inbox has been drained.
    #[error("inbox shut down")]
    Shutdown,
}

/// Failures raised by the receive handler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// Packet could not be decoded; it is discarded.
    #[error("malformed packet: {0}")]
    Malformed(PacketError),
    /// Message could not be enqueued. Fatal to the receiving node.
    #[error("{node}: could not enqueue message: {cause}")]
    AllocationFailure {
        /// Node whose inbox refused the message.
        node: NodeId,
        /// Reason reported by the inbox.
        cause: InboxError,
    },
}

/// Reasons a node task stopped abnormally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
    /// The receive handler hit a fatal failure and stopped the node.
    #[error("receive handler failed: {0}")]
    Handler(#[from] HandlerError),
    /// A receive call failed in a way the task cannot recover from.
    #[error("inbox error: {0}")]
    Inbox(#[from] InboxError),
}
