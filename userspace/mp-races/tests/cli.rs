// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Integration tests for the mp-races CLI
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 3 integration tests
//!
//! TEST_SCENARIOS:
//!   - help_lists_flags(): usage mentions every flag
//!   - variant_b_summary(): one Variant B run ends at -40
//!   - reversed_jitter_is_usage_error(): flag validation

use mp_races::cli::CliError;

#[test]
fn help_lists_flags() {
    let usage = mp_races::help();
    for flag in ["--config", "--variant", "--runs", "--rounds", "--jitter-us", "--atomic"] {
        assert!(usage.contains(flag), "missing {flag}");
    }
}

#[test]
fn variant_b_summary() {
    let out = mp_races::execute(&["--variant", "b"]).unwrap();
    assert!(out.contains("final balances: -40 x1"), "{out}");
    assert!(out.contains("unclean runs: 0"), "{out}");
}

#[test]
fn reversed_jitter_is_usage_error() {
    assert!(matches!(mp_races::execute(&["--jitter-us", "9..1"]), Err(CliError::Usage(_))));
}
