// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Platform runtime interface consumed by the substrate.
//!
//! Everything below this trait (addressing, topology, flit encoding, interrupt
//! wiring, task spawning) belongs to the platform. [`crate::HostFabric`] is the
//! in-process implementation used on the host.

use std::sync::Arc;

use crate::NodeId;

/// Callback invoked once per arriving packet with the raw packet words.
pub type ReceiveCallback = Arc<dyn Fn(&[u32]) + Send + Sync>;

/// The three services the platform runtime provides to a node.
pub trait Platform: Send + Sync {
    /// Address of the calling node.
    fn my_node_id(&self) -> NodeId;

    /// Hands an encoded packet to the transport. Fire and forget: no delivery
    /// confirmation and no error, even for unknown destinations.
    fn transmit(&self, words: &[u32]);

    /// Registers `callback` for packets of message class `class`.
    ///
    /// The callback runs on the platform's delivery context, asynchronously to
    /// the node task.
    fn register_receive_handler(&self, class: u8, callback: ReceiveCallback);
}
