// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Send primitive: encodes a packet and hands it to the platform.

use std::sync::Arc;

use fabric_wire::Packet;
use log::trace;

use crate::{NodeId, Platform};

/// Per-node send handle. Cheap to clone.
#[derive(Clone)]
pub struct Sender {
    platform: Arc<dyn Platform>,
    me: NodeId,
}

impl Sender {
    /// Creates a sender stamping outgoing packets with the platform's node id.
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        let me = platform.my_node_id();
        Self { platform, me }
    }

    /// Node id written into the source field.
    pub fn node_id(&self) -> NodeId {
        self.me
    }

    /// Sends one packet to `dest`. Never fails from the caller's point of view.
    pub fn send(&self, dest: NodeId, opcode: u32, payload: u32) {
        let packet = Packet::new(dest.raw(), self.me.raw(), opcode, payload);
        trace!("{} -> {}: type {} data {}", self.me, dest, opcode, payload as i32);
        self.platform.transmit(&packet.encode());
    }

    /// Sends a signed payload.
    pub fn send_value(&self, dest: NodeId, opcode: u32, value: i32) {
        self.send(dest, opcode, value as u32);
    }

    /// Sends the same packet to every node in `dests`, in order.
    pub fn broadcast(&self, dests: &[NodeId], opcode: u32, value: i32) {
        for dest in dests {
            self.send_value(*dest, opcode, value);
        }
    }
}
