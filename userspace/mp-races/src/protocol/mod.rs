// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Node task state machines for the bank/ATM protocols
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per variant + `tests/variant_c.rs`
//!
//! Every variant plugs into the same substrate through [`NodeTask`]. The
//! default [`NodeTask::run`] pops messages one at a time and feeds them to
//! [`NodeTask::on_message`] until the node is stopped; the Variant A tasks and
//! the Variant C ATM drive their own loops.

use fabric_ipc::{InboxError, Message, NodeContext, NodeError, NodeId};
use log::debug;

use crate::config::{ScenarioConfig, Variant};
use crate::role::Role;

pub mod passive;
pub mod variant_a;
pub mod variant_b;
pub mod variant_c;

/// Opcodes shared by the push-style Variants A and B.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PushOpcode {
    /// Latest balance pushed by the bank.
    BalanceInfo = 0,
    /// Signed delta requested by an ATM.
    ChangeBalance = 1,
}

impl PushOpcode {
    /// Decodes a raw opcode; `None` for values outside the set.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::BalanceInfo),
            1 => Some(Self::ChangeBalance),
            _ => None,
        }
    }

    /// Raw wire value.
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

/// What the task loop does after handling a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep receiving.
    Continue,
    /// Leave the loop.
    Stop,
}

/// What a node did during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeReport {
    /// Reporting node.
    pub node: NodeId,
    /// Role it ran.
    pub role: Role,
    /// Bank: final balance. ATM: last balance it cached.
    pub balance: Option<i32>,
    /// Every balance the node received, in order.
    pub observed: Vec<i32>,
    /// Requests that modify the balance (withdrawals, SETs, decrements).
    pub requests: u32,
    /// Total amount the node asked the bank to take off.
    pub debited: i64,
    /// Messages handled.
    pub received: u64,
    /// Responses discarded because they did not match the pending request.
    pub mismatches: u32,
    /// Messages ignored because their opcode is not part of the protocol.
    pub ignored: u32,
}

impl NodeReport {
    /// Empty report for `node`.
    pub fn new(node: NodeId, role: Role) -> Self {
        Self {
            node,
            role,
            balance: None,
            observed: Vec::new(),
            requests: 0,
            debited: 0,
            received: 0,
            mismatches: 0,
            ignored: 0,
        }
    }
}

/// Application logic of one node.
pub trait NodeTask: Send {
    /// Called once before the first receive.
    fn on_start(&mut self, _ctx: &NodeContext) {}

    /// Handles one popped message.
    fn on_message(&mut self, ctx: &NodeContext, msg: Message) -> Flow;

    /// Runs the node until it is stopped or its work is done.
    fn run(&mut self, ctx: &NodeContext) -> Result<(), NodeError> {
        drain(self, ctx)
    }

    /// Snapshot of what the node did.
    fn report(&self, node: NodeId) -> NodeReport;
}

/// Default task loop: `on_start`, then pop and dispatch until shutdown.
pub fn drain<T: NodeTask + ?Sized>(task: &mut T, ctx: &NodeContext) -> Result<(), NodeError> {
    task.on_start(ctx);
    loop {
        match ctx.pop_blocking() {
            Ok(msg) => {
                if task.on_message(ctx, msg) == Flow::Stop {
                    break;
                }
            }
            Err(InboxError::Shutdown) => break,
            Err(err) => return Err(err.into()),
        }
    }
    debug!("{}: task loop finished", ctx.id());
    ctx.exit_status()
}

/// Builds the task `role` runs under `config`.
pub fn task_for(role: Role, config: &ScenarioConfig) -> Box<dyn NodeTask> {
    let topology = &config.topology;
    match (config.variant, role) {
        (_, Role::PassiveReceiver) => Box::new(passive::PassiveReceiver::default()),
        (Variant::A, Role::Bank) => {
            Box::new(variant_a::Bank::new(config.initial_balance, topology.atms.clone()))
        }
        (Variant::A, Role::Atm) => Box::new(variant_a::Atm::default()),
        (Variant::B, Role::Bank) => {
            Box::new(variant_b::Bank::new(config.initial_balance, topology.atms.clone()))
        }
        (Variant::B, Role::Atm) => Box::new(variant_b::Atm::new(topology.bank, config.withdrawal)),
        (Variant::C, Role::Bank) => Box::new(variant_c::Bank::new(config.initial_balance)),
        (Variant::C, Role::Atm) => {
            Box::new(variant_c::Atm::new(topology.bank, config.rounds, config.consistency))
        }
    }
}
