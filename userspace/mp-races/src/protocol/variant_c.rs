// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Variant C, get/decrement/set round trips against the bank
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/variant_c.rs`
//!
//! ATM loop: `SEND_GET -> AWAIT_RESP -> GOT_BALANCE -> DECREMENT -> SEND_SET`,
//! then around again. The read-modify-write spans two round trips, so two ATMs
//! reading the same balance both write back `balance - 1` and one decrement is
//! lost. That race is the point of the variant.
//!
//! Before each `SEND_GET` the ATM discards whatever is already queued, so a
//! leftover `GET_BALANCE_RESP` from an earlier exchange is never read as the
//! answer to the new request.
//!
//! `AWAIT_RESP` has no timeout. If the bank stops answering the ATM hangs
//! until the node is stopped.
//!
//! [`Consistency::Atomic`] replaces the GET/SET pair with one `DECREMENT_REQ`
//! the bank applies in its serialized loop. It is the fixed mode, not the
//! default.

use fabric_ipc::{InboxError, Message, NodeContext, NodeError, NodeId};
use log::{debug, info, trace, warn};

use super::{Flow, NodeReport, NodeTask};
use crate::config::Consistency;
use crate::role::Role;

/// Variant C opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    /// ATM asks for the balance.
    GetBalanceReq = 0,
    /// Bank answers with the balance.
    GetBalanceResp = 1,
    /// ATM overwrites the balance.
    SetBalanceReq = 2,
    /// ATM asks the bank to subtract the payload (atomic mode only).
    DecrementReq = 3,
}

impl Opcode {
    /// Decodes a raw opcode; `None` for values outside the set.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::GetBalanceReq),
            1 => Some(Self::GetBalanceResp),
            2 => Some(Self::SetBalanceReq),
            3 => Some(Self::DecrementReq),
            _ => None,
        }
    }

    /// Raw wire value.
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// Bank side of Variant C.
pub struct Bank {
    balance: i32,
    received: u64,
    ignored: u32,
}

impl Bank {
    /// Bank holding `balance`.
    pub fn new(balance: i32) -> Self {
        Self { balance, received: 0, ignored: 0 }
    }

    /// Current balance.
    pub fn balance(&self) -> i32 {
        self.balance
    }
}

impl NodeTask for Bank {
    fn on_start(&mut self, ctx: &NodeContext) {
        info!("{}: bank up, balance {}", ctx.id(), self.balance);
    }

    fn on_message(&mut self, ctx: &NodeContext, msg: Message) -> Flow {
        self.received += 1;
        match Opcode::from_raw(msg.opcode) {
            Some(Opcode::GetBalanceReq) => {
                debug!("{}: get from {} -> {}", ctx.id(), msg.source, self.balance);
                ctx.send(msg.source, Opcode::GetBalanceResp.raw(), self.balance);
            }
            Some(Opcode::SetBalanceReq) => {
                debug!("{}: set from {}: {} -> {}", ctx.id(), msg.source, self.balance, msg.value());
                self.balance = msg.value();
            }
            Some(Opcode::DecrementReq) => {
                self.balance = self.balance.wrapping_sub(msg.value());
                debug!("{}: decrement from {} -> {}", ctx.id(), msg.source, self.balance);
            }
            Some(Opcode::GetBalanceResp) | None => {
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

/// ATM side of Variant C.
pub struct Atm {
    bank: NodeId,
    rounds: Option<u32>,
    consistency: Consistency,
    completed: u32,
    observed: Vec<i32>,
    received: u64,
    mismatches: u32,
}

impl Atm {
    /// ATM running `rounds` round trips (`None`: until stopped) against `bank`.
    pub fn new(bank: NodeId, rounds: Option<u32>, consistency: Consistency) -> Self {
        Self {
            bank,
            rounds,
            consistency,
            completed: 0,
            observed: Vec::new(),
            received: 0,
            mismatches: 0,
        }
    }

    /// Round trips finished so far.
    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Pops until a `GET_BALANCE_RESP` from the bank arrives and returns its balance.
    ///
    /// Other messages go through [`NodeTask::on_message`], which counts and discards them.
    pub fn await_response(&mut self, ctx: &NodeContext) -> Result<i32, InboxError> {
        loop {
            let msg = ctx.pop_blocking()?;
            self.received += 1;
            if Opcode::from_raw(msg.opcode) == Some(Opcode::GetBalanceResp) && msg.source == self.bank
            {
                return Ok(msg.value());
            }
            self.on_message(ctx, msg);
        }
    }

    /// Discards everything already queued, so a leftover response is never
    /// taken as the answer to the next request.
    fn discard_stale(&mut self, ctx: &NodeContext) -> Result<(), InboxError> {
        loop {
            match ctx.pop_nonblocking() {
                Ok(msg) => {
                    self.received += 1;
                    self.on_message(ctx, msg);
                }
                Err(InboxError::QueueEmpty) => return Ok(()),
                Err(err) => return Err(err),
            }
        }
    }

    /// Runs one round trip.
    pub fn round(&mut self, ctx: &NodeContext) -> Result<(), InboxError> {
        match self.consistency {
            Consistency::Racy => {
                self.discard_stale(ctx)?;
                trace!("{}: SEND_GET", ctx.id());
                ctx.send(self.bank, Opcode::GetBalanceReq.raw(), 0);
                let balance = self.await_response(ctx)?;
                self.observed.push(balance);
                let next = balance.wrapping_sub(1);
                debug!("{}: got {balance}, setting {next}", ctx.id());
                ctx.send(self.bank, Opcode::SetBalanceReq.raw(), next);
            }
            Consistency::Atomic => {
                debug!("{}: decrement by 1", ctx.id());
                ctx.send(self.bank, Opcode::DecrementReq.raw(), 1);
            }
        }
        self.completed += 1;
        Ok(())
    }

    fn has_rounds_left(&self) -> bool {
        !matches!(self.rounds, Some(rounds) if self.completed >= rounds)
    }
}

impl NodeTask for Atm {
    fn on_message(&mut self, ctx: &NodeContext, msg: Message) -> Flow {
        self.mismatches += 1;
        warn!(
            "{}: protocol mismatch: discarding opcode {} from {}",
            ctx.id(),
            msg.opcode,
            msg.source
        );
        Flow::Continue
    }

    fn run(&mut self, ctx: &NodeContext) -> Result<(), NodeError> {
        info!("{}: atm up, bank {}", ctx.id(), self.bank);
        while self.has_rounds_left() && !ctx.is_stopping() {
            match self.round(ctx) {
                Ok(()) => {}
                Err(InboxError::Shutdown) => break,
                Err(err) => return Err(err.into()),
            }
        }
        info!("{}: atm done after {} rounds", ctx.id(), self.completed);
        ctx.exit_status()
    }

    fn report(&self, node: NodeId) -> NodeReport {
        NodeReport {
            balance: self.observed.last().copied(),
            observed: self.observed.clone(),
            requests: self.completed,
            debited: i64::from(self.completed),
            received: self.received,
            mismatches: self.mismatches,
            ..NodeReport::new(node, Role::Atm)
        }
    }
}
