// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Variant A: push/broadcast over single-slot buffers.
//!
//! The bank pushes `BALANCE_INFO` to every ATM once and then idles; it never
//! reads its own slot, so the balance never changes. ATMs poll their slot and
//! copy each `BALANCE_INFO` into a local cache. Anything else stays in the
//! slot unreleased, which wedges the slot for good.

use std::thread;

use fabric_ipc::{Message, NodeContext, NodeError, NodeId};
use log::{debug, info, warn};

use super::{drain, Flow, NodeReport, NodeTask, PushOpcode};
use crate::role::Role;

/// Bank side of Variant A.
pub struct Bank {
    balance: i32,
    atms: Vec<NodeId>,
}

impl Bank {
    /// Bank holding `balance` that informs `atms` at start.
    pub fn new(balance: i32, atms: Vec<NodeId>) -> Self {
        Self { balance, atms }
    }
}

impl NodeTask for Bank {
    fn on_start(&mut self, ctx: &NodeContext) {
        info!("{}: bank up, balance {}", ctx.id(), self.balance);
        ctx.sender().broadcast(&self.atms, PushOpcode::BalanceInfo.raw(), self.balance);
    }

    fn on_message(&mut self, _ctx: &NodeContext, _msg: Message) -> Flow {
        Flow::Continue
    }

    fn run(&mut self, ctx: &NodeContext) -> Result<(), NodeError> {
        self.on_start(ctx);
        ctx.shutdown_signal().wait();
        ctx.exit_status()
    }

    fn report(&self, node: NodeId) -> NodeReport {
        NodeReport { balance: Some(self.balance), ..NodeReport::new(node, Role::Bank) }
    }
}

/// ATM side of Variant A.
#[derive(Default)]
pub struct Atm {
    cached: Option<i32>,
    observed: Vec<i32>,
    ignored: u32,
    stuck: bool,
}

impl Atm {
    fn cache(&mut self, ctx: &NodeContext, balance: i32) {
        debug!("{}: balance info {balance}", ctx.id());
        self.cached = Some(balance);
        self.observed.push(balance);
    }
}

impl NodeTask for Atm {
    fn on_message(&mut self, ctx: &NodeContext, msg: Message) -> Flow {
        match PushOpcode::from_raw(msg.opcode) {
            Some(PushOpcode::BalanceInfo) => self.cache(ctx, msg.value()),
            _ => self.ignored += 1,
        }
        Flow::Continue
    }

    fn run(&mut self, ctx: &NodeContext) -> Result<(), NodeError> {
        let Some(slot) = ctx.slot() else {
            return drain(self, ctx);
        };
        while !ctx.is_stopping() {
            if let Some(view) = slot.read() {
                if PushOpcode::from_raw(view.opcode) == Some(PushOpcode::BalanceInfo) {
                    self.cache(ctx, view.payload as i32);
                    slot.release();
                } else if !self.stuck {
                    warn!("{}: opcode {} left in slot from {}", ctx.id(), view.opcode, view.src);
                    self.stuck = true;
                    self.ignored += 1;
                }
            }
            core::hint::spin_loop();
            thread::yield_now();
        }
        ctx.exit_status()
    }

    fn report(&self, node: NodeId) -> NodeReport {
        NodeReport {
            balance: self.cached,
            observed: self.observed.clone(),
            received: self.observed.len() as u64,
            ignored: self.ignored,
            ..NodeReport::new(node, Role::Atm)
        }
    }
}
