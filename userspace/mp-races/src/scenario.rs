// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scenario harness: wires nodes onto a host fabric, runs them, collects results
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: `tests/races_e2e` + unit tests below
//!
//! Lifecycle of one run:
//!   1. attach every topology node to a fresh fabric (buffer + receive handler)
//!   2. spawn one task thread per node; ATMs optionally meet on a start barrier
//!   3. wait for ATMs with a round budget, for quiescence, or for the run time
//!   4. stop ATMs and passive receivers, let the fabric drain, stop the bank
//!   5. join every task and collect its report
//!
//! Node ids outside the topology are never attached; packets sent to them are
//! lost on the fabric.

use std::io;
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fabric_ipc::{HostFabric, NodeContext, NodeError, NodeId};
use log::{info, warn};
use thiserror::Error;

use crate::config::{ConfigError, Consistency, ScenarioConfig, Variant};
use crate::protocol::{self, NodeReport};
use crate::role::Role;

/// Failures that prevent a scenario from producing a report.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A node could not be attached to the fabric.
    #[error("failed to attach {node}: {source}")]
    Attach {
        /// Node being attached.
        node: NodeId,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A task thread could not be spawned.
    #[error("failed to spawn task for {node}: {source}")]
    Spawn {
        /// Node whose task failed to start.
        node: NodeId,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// A task thread panicked.
    #[error("task for {0} panicked")]
    Panicked(NodeId),
}

/// Outcome of one run.
#[derive(Debug)]
pub struct ScenarioReport {
    /// Variant that ran.
    pub variant: Variant,
    /// Variant C update mode.
    pub consistency: Consistency,
    /// Balance the bank started with.
    pub initial_balance: i32,
    /// Balance the bank ended with.
    pub final_balance: i32,
    /// Bank report.
    pub bank: NodeReport,
    /// ATM reports in topology order.
    pub atms: Vec<NodeReport>,
    /// Passive receiver reports in topology order.
    pub passive: Vec<NodeReport>,
    /// Messages dropped by bounded inboxes, per node.
    pub dropped: Vec<(NodeId, u64)>,
    /// Nodes that stopped with an error.
    pub failures: Vec<(NodeId, NodeError)>,
    /// Packets the fabric could not deliver.
    pub lost_packets: u64,
    /// `true` when a wait phase hit the configured timeout.
    pub timed_out: bool,
}

impl ScenarioReport {
    /// Balance the bank would hold had every ATM request been applied.
    pub fn expected_balance(&self) -> i64 {
        let debited: i64 = self.atms.iter().map(|atm| atm.debited).sum();
        i64::from(self.initial_balance) - debited
    }

    /// Balance units the bank still holds that it should have paid out.
    ///
    /// For Variant C every unit is one lost decrement.
    pub fn lost_updates(&self) -> u64 {
        (i64::from(self.final_balance) - self.expected_balance()).max(0) as u64
    }

    /// Returns `true` when no node failed and no wait timed out.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.timed_out
    }
}

type TaskOutcome = (NodeReport, Result<(), NodeError>);

struct Running {
    id: NodeId,
    role: Role,
    ctx: NodeContext,
    handle: Option<JoinHandle<TaskOutcome>>,
}

impl Running {
    fn is_finished(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }
}

/// A validated scenario ready to run any number of times.
#[derive(Clone, Debug)]
pub struct Scenario {
    config: ScenarioConfig,
}

impl Scenario {
    /// Validates `config`.
    pub fn new(config: ScenarioConfig) -> Result<Self, ScenarioError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Same scenario with another jitter seed. The seed does not affect validity.
    pub fn with_seed(&self, seed: u64) -> Self {
        Self { config: ScenarioConfig { seed, ..self.config.clone() } }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Runs the scenario once on a fresh fabric.
    pub fn run(&self) -> Result<ScenarioReport, ScenarioError> {
        let config = &self.config;
        let fabric = HostFabric::new(config.fabric());
        let mut nodes = Vec::with_capacity(config.topology.len());
        for (id, role) in config.topology.nodes() {
            let port =
                fabric.attach(id).map_err(|source| ScenarioError::Attach { node: id, source })?;
            let ctx = NodeContext::attach(port, config.mailbox());
            nodes.push(Running { id, role, ctx, handle: None });
        }
        info!(
            "scenario: variant {:?} ({:?}), balance {}, {} nodes",
            config.variant,
            config.consistency,
            config.initial_balance,
            nodes.len()
        );

        if let Err(err) = self.spawn_all(&mut nodes) {
            for node in &nodes {
                node.ctx.stop();
            }
            return Err(err);
        }

        let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);
        let mut timed_out = false;
        if config.atms_terminate() {
            timed_out |= !wait_for_atms(&nodes, deadline);
            timed_out |= !quiesce(&fabric, &nodes, self.settle(), deadline);
        } else if config.variant == Variant::C {
            thread::sleep(Duration::from_millis(config.run_for_ms));
        } else {
            timed_out |= !quiesce(&fabric, &nodes, self.settle(), deadline);
        }

        for node in nodes.iter().filter(|node| node.role != Role::Bank) {
            node.ctx.stop();
        }
        if !fabric.wait_idle(Duration::from_millis(config.timeout_ms)) {
            warn!("scenario: fabric still busy at shutdown");
        }
        for node in nodes.iter().filter(|node| node.role == Role::Bank) {
            node.ctx.stop();
        }

        let report = self.collect(&mut nodes, &fabric, timed_out);
        fabric.shutdown();
        report
    }

    fn settle(&self) -> Duration {
        Duration::from_millis(self.config.settle_ms)
    }

    fn spawn_all(&self, nodes: &mut [Running]) -> Result<(), ScenarioError> {
        let atm_count = self.config.topology.atms.len();
        let barrier = self.config.synchronized_start.then(|| Arc::new(Barrier::new(atm_count)));
        for node in nodes.iter_mut() {
            let mut task = protocol::task_for(node.role, &self.config);
            let ctx = node.ctx.clone();
            let gate = if node.role == Role::Atm { barrier.clone() } else { None };
            let handle = thread::Builder::new()
                .name(format!("{}-{}", node.role, node.id.raw()))
                .spawn(move || {
                    if let Some(gate) = gate {
                        gate.wait();
                    }
                    let result = task.run(&ctx);
                    (task.report(ctx.id()), result)
                })
                .map_err(|source| ScenarioError::Spawn { node: node.id, source })?;
            node.handle = Some(handle);
        }
        Ok(())
    }

    fn collect(
        &self,
        nodes: &mut [Running],
        fabric: &HostFabric,
        timed_out: bool,
    ) -> Result<ScenarioReport, ScenarioError> {
        let mut bank = None;
        let mut atms = Vec::new();
        let mut passive = Vec::new();
        let mut dropped = Vec::new();
        let mut failures = Vec::new();
        for node in nodes.iter_mut() {
            let Some(handle) = node.handle.take() else {
                continue;
            };
            let (report, result) = handle.join().map_err(|_| ScenarioError::Panicked(node.id))?;
            if let Err(err) = result {
                warn!("scenario: {} failed: {err}", node.id);
                failures.push((node.id, err));
            }
            let lost = node.ctx.mailbox().dropped();
            if lost > 0 {
                dropped.push((node.id, lost));
            }
            match node.role {
                Role::Bank => bank = Some(report),
                Role::Atm => atms.push(report),
                Role::PassiveReceiver => passive.push(report),
            }
        }
        let config = &self.config;
        let bank = bank.unwrap_or_else(|| NodeReport::new(config.topology.bank, Role::Bank));
        let final_balance = bank.balance.unwrap_or(config.initial_balance);
        let report = ScenarioReport {
            variant: config.variant,
            consistency: config.consistency,
            initial_balance: config.initial_balance,
            final_balance,
            bank,
            atms,
            passive,
            dropped,
            failures,
            lost_packets: fabric.stats().lost,
            timed_out,
        };
        info!(
            "scenario: final balance {} (expected {}, lost {})",
            report.final_balance,
            report.expected_balance(),
            report.lost_updates()
        );
        Ok(report)
    }
}

/// Waits until every ATM task returned. `false` on timeout or node failure.
fn wait_for_atms(nodes: &[Running], deadline: Instant) -> bool {
    loop {
        if nodes.iter().filter(|node| node.role == Role::Atm).all(Running::is_finished) {
            return true;
        }
        if let Some(node) = nodes.iter().find(|node| node.ctx.exit_status().is_err()) {
            warn!("scenario: {} failed while ATMs were running", node.id);
            return false;
        }
        if Instant::now() >= deadline {
            warn!("scenario: ATMs did not finish in time");
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Waits until the fabric is idle, every buffer is empty and nothing moved
/// for one `settle` period. `false` on timeout.
fn quiesce(fabric: &HostFabric, nodes: &[Running], settle: Duration, deadline: Instant) -> bool {
    let mut last = None;
    loop {
        let idle = fabric.wait_idle(deadline.saturating_duration_since(Instant::now()));
        let consumed: u64 = nodes.iter().map(|node| node.ctx.mailbox().consumed()).sum();
        let snapshot = (fabric.stats().transmitted, consumed);
        let empty = nodes.iter().all(|node| node.ctx.mailbox().is_empty());
        if idle && empty && last == Some(snapshot) {
            return true;
        }
        if Instant::now() >= deadline {
            warn!("scenario: no quiescence before timeout");
            return false;
        }
        last = Some(snapshot);
        thread::sleep(settle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Topology;

    fn finite_c(rounds: u32) -> ScenarioConfig {
        ScenarioConfig { rounds: Some(rounds), ..ScenarioConfig::default() }
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = ScenarioConfig {
            topology: Topology { atms: Vec::new(), ..Topology::default() },
            ..ScenarioConfig::default()
        };
        assert!(matches!(Scenario::new(config), Err(ScenarioError::Config(_))));
    }

    #[test]
    fn single_atm_never_loses_updates() {
        let config = ScenarioConfig {
            topology: Topology { atms: vec![NodeId::new(1)], ..Topology::default() },
            ..finite_c(5)
        };
        let report = Scenario::new(config).unwrap().run().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.final_balance, 95);
        assert_eq!(report.expected_balance(), 95);
        assert_eq!(report.lost_updates(), 0);
        assert_eq!(report.atms[0].observed, vec![100, 99, 98, 97, 96]);
    }

    #[test]
    fn report_counts_lost_units() {
        let report = ScenarioReport {
            variant: Variant::C,
            consistency: Consistency::Racy,
            initial_balance: 100,
            final_balance: 99,
            bank: NodeReport::new(NodeId::new(0), Role::Bank),
            atms: vec![
                NodeReport { debited: 1, ..NodeReport::new(NodeId::new(1), Role::Atm) },
                NodeReport { debited: 1, ..NodeReport::new(NodeId::new(2), Role::Atm) },
            ],
            passive: Vec::new(),
            dropped: Vec::new(),
            failures: Vec::new(),
            lost_packets: 0,
            timed_out: false,
        };
        assert_eq!(report.expected_balance(), 98);
        assert_eq!(report.lost_updates(), 1);
    }
}
