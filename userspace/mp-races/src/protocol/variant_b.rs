// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Variant B: queued push with one split withdrawal per ATM.
//!
//! The bank broadcasts its balance, then applies each `CHANGE_BALANCE` delta
//! in its receive loop and re-broadcasts. An ATM withdraws once, on the first
//! positive balance it sees, which may already be stale by the time the bank
//! applies the request.

use fabric_ipc::{Message, NodeContext, NodeId};
use log::{debug, info};

use super::{Flow, NodeReport, NodeTask, PushOpcode};
use crate::role::Role;

/// Bank side of Variant B.
pub struct Bank {
    balance: i32,
    atms: Vec<NodeId>,
    received: u64,
    ignored: u32,
}

impl Bank {
    /// Bank holding `balance` that keeps `atms` informed.
    pub fn new(balance: i32, atms: Vec<NodeId>) -> Self {
        Self { balance, atms, received: 0, ignored: 0 }
    }

    /// Current balance.
    pub fn balance(&self) -> i32 {
        self.balance
    }
}

impl NodeTask for Bank {
    fn on_start(&mut self, ctx: &NodeContext) {
        info!("{}: bank up, balance {}", ctx.id(), self.balance);
        ctx.sender().broadcast(&self.atms, PushOpcode::BalanceInfo.raw(), self.balance);
    }

    fn on_message(&mut self, ctx: &NodeContext, msg: Message) -> Flow {
        self.received += 1;
        match PushOpcode::from_raw(msg.opcode) {
            Some(PushOpcode::ChangeBalance) => {
                self.balance = self.balance.wrapping_add(msg.value());
                info!(
                    "{}: {} changed balance by {} to {}",
                    ctx.id(),
                    msg.source,
                    msg.value(),
                    self.balance
                );
                ctx.sender().broadcast(&self.atms, PushOpcode::BalanceInfo.raw(), self.balance);
            }
            _ => {
                debug!("{}: ignoring opcode {} from {}", ctx.id(), msg.opcode, msg.source);
                self.ignored += 1;
            }
        }
        Flow::Continue
    }

    fn report(&self, node: NodeId) -> NodeReport {
        NodeReport {
            balance: Some(self.balance),
            received: self.received,
            ignored: self.ignored,
            ..NodeReport::new(node, Role::Bank)
        }
    }
}

/// ATM side of Variant B.
pub struct Atm {
    bank: NodeId,
    withdrawal: i32,
    cached: Option<i32>,
    withdrawn: bool,
    observed: Vec<i32>,
    ignored: u32,
}

impl Atm {
    /// ATM that withdraws `withdrawal` from `bank` once.
    pub fn new(bank: NodeId, withdrawal: i32) -> Self {
        Self { bank, withdrawal, cached: None, withdrawn: false, observed: Vec::new(), ignored: 0 }
    }

    /// Returns `true` once the withdrawal was sent.
    pub fn has_withdrawn(&self) -> bool {
        self.withdrawn
    }
}

impl NodeTask for Atm {
    fn on_message(&mut self, ctx: &NodeContext, msg: Message) -> Flow {
        match PushOpcode::from_raw(msg.opcode) {
            Some(PushOpcode::BalanceInfo) => {
                let balance = msg.value();
                debug!("{}: balance info {balance}", ctx.id());
                self.cached = Some(balance);
                self.observed.push(balance);
                if balance > 0 && !self.withdrawn {
                    info!("{}: withdrawing {} against balance {balance}", ctx.id(), self.withdrawal);
                    ctx.send(self.bank, PushOpcode::ChangeBalance.raw(), -self.withdrawal);
                    self.withdrawn = true;
                }
            }
            _ => self.ignored += 1,
        }
        Flow::Continue
    }

    fn report(&self, node: NodeId) -> NodeReport {
        let requests = u32::from(self.withdrawn);
        NodeReport {
            balance: self.cached,
            observed: self.observed.clone(),
            requests,
            debited: i64::from(requests) * i64::from(self.withdrawal),
            received: self.observed.len() as u64 + u64::from(self.ignored),
            ignored: self.ignored,
            ..NodeReport::new(node, Role::Atm)
        }
    }
}
