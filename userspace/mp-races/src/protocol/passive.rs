// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Passive receiver: drains its inbox and logs every message.

use fabric_ipc::{Message, NodeContext, NodeId};
use log::info;

use super::{Flow, NodeReport, NodeTask};
use crate::role::Role;

/// Node that only listens.
#[derive(Default)]
pub struct PassiveReceiver {
    received: Vec<Message>,
}

impl PassiveReceiver {
    /// Messages received so far, in arrival order.
    pub fn received(&self) -> &[Message] {
        &self.received
    }
}

impl NodeTask for PassiveReceiver {
    fn on_message(&mut self, ctx: &NodeContext, msg: Message) -> Flow {
        info!("{}: msg from {} type {} data {}", ctx.id(), msg.source, msg.opcode, msg.value());
        self.received.push(msg);
        Flow::Continue
    }

    fn report(&self, node: NodeId) -> NodeReport {
        NodeReport {
            observed: self.received.iter().map(Message::value).collect(),
            received: self.received.len() as u64,
            ..NodeReport::new(node, Role::PassiveReceiver)
        }
    }
}
