// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scenario configuration loading from TOML files
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 5 integration tests
//!
//! TEST_SCENARIOS:
//!   - empty_file_yields_defaults(): every field defaults
//!   - full_file_parses(): all sections, kebab-case enums
//!   - unknown_key_is_parse_error(): schema is closed
//!   - invalid_topology_is_rejected(): validation runs on load
//!   - missing_file_is_read_error(): I/O errors carry the path

use std::fs;
use std::path::Path;

use fabric_ipc::{InboxConfig, NodeId, OverflowPolicy, SlotDiscipline, WaitStrategy};
use mp_races::{ConfigError, Consistency, JitterRange, ScenarioConfig, Variant};
use tempfile::TempDir;

fn write(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("scenario.toml");
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn empty_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ScenarioConfig::load(&write(&dir, "")).unwrap();
    assert_eq!(config, ScenarioConfig::default());
}

#[test]
fn full_file_parses() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        r#"
variant = "b"
initial-balance = 500
withdrawal = 120
rounds = 10
consistency = "atomic"
synchronized-start = false
seed = 42
slot = "published"

[inbox]
capacity = 8
overflow = "drop-newest"
strategy = "spin"

[jitter]
min-us = 10
max-us = 250

[topology]
bank = 3
atms = [4, 5, 6]
passive = [9]
"#,
    );
    let config = ScenarioConfig::load(&path).unwrap();
    assert_eq!(config.variant, Variant::B);
    assert_eq!(config.initial_balance, 500);
    assert_eq!(config.withdrawal, 120);
    assert_eq!(config.rounds, Some(10));
    assert_eq!(config.consistency, Consistency::Atomic);
    assert!(!config.synchronized_start);
    assert_eq!(config.seed, 42);
    assert_eq!(config.slot, SlotDiscipline::Published);
    assert_eq!(
        config.inbox,
        InboxConfig {
            capacity: Some(8),
            overflow: OverflowPolicy::DropNewest,
            strategy: WaitStrategy::Spin
        }
    );
    assert_eq!(config.jitter, Some(JitterRange { min_us: 10, max_us: 250 }));
    assert_eq!(config.topology.bank, NodeId::new(3));
    assert_eq!(config.topology.atms, vec![NodeId::new(4), NodeId::new(5), NodeId::new(6)]);
    assert_eq!(config.topology.passive, vec![NodeId::new(9)]);
}

#[test]
fn unknown_key_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let err = ScenarioConfig::load(&write(&dir, "balance = 3\n")).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn invalid_topology_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "[topology]\nbank = 1\natms = [1, 2]\n");
    assert!(matches!(ScenarioConfig::load(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn missing_file_is_read_error() {
    let err = ScenarioConfig::load(Path::new("/nonexistent/scenario.toml")).unwrap_err();
    match err {
        ConfigError::Read { path, .. } => assert_eq!(path, Path::new("/nonexistent/scenario.toml")),
        other => panic!("unexpected error: {other}"),
    }
}
