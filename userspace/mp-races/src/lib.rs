// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Bank/ATM race-condition scenarios on the fabric message-passing substrate
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + `tests/` + workspace `tests/races_e2e`
//!
//! PUBLIC API:
//!   - ScenarioConfig: TOML-backed description of a run
//!   - Role/Topology: role dispatch by node id
//!   - protocol: NodeTask trait and Variants A, B and C
//!   - Scenario/ScenarioReport: harness and its results
//!   - cli: `mp-races` front end (help/execute/run)
//!
//! The races are deliberate. Nothing here serializes ATMs against each other
//! unless the atomic consistency mode is selected.
//!
//! DEPENDENCIES:
//!   - fabric-ipc: inbox, slot buffer, send, host fabric
//!   - serde/toml: configuration files
//!   - clap: argument parsing

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

pub mod cli;
pub mod config;
pub mod protocol;
pub mod role;
pub mod scenario;

pub use cli::{execute, help, run};
pub use config::{ConfigError, Consistency, JitterRange, ScenarioConfig, Variant};
pub use protocol::{NodeReport, NodeTask};
pub use role::{Role, Topology};
pub use scenario::{Scenario, ScenarioError, ScenarioReport};
