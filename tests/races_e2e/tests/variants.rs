// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Variant A and B end-to-end behaviour
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 4 integration tests
//!
//! TEST_SCENARIOS:
//!   - variant_a_never_moves_balance(): published slots, ATMs see 100
//!   - variant_a_racy_slot_keeps_balance(): torn reads never reach the bank
//!   - variant_b_applies_both_withdrawals(): 100 - 2 * 70 = -40
//!   - variant_b_custom_withdrawal(): amounts come from the configuration

use fabric_ipc::SlotDiscipline;
use mp_races::{Role, ScenarioConfig, Variant};
use races_e2e::run_many;

fn variant(variant: Variant) -> ScenarioConfig {
    ScenarioConfig { variant, ..ScenarioConfig::default() }
}

#[test]
fn variant_a_never_moves_balance() {
    let config = ScenarioConfig { slot: SlotDiscipline::Published, ..variant(Variant::A) };
    for report in run_many(&config, 5) {
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.final_balance, 100);
        assert_eq!(report.expected_balance(), 100);
        for atm in &report.atms {
            assert_eq!(atm.role, Role::Atm);
            assert_eq!(atm.observed, vec![100]);
            assert_eq!(atm.requests, 0);
        }
    }
}

#[test]
fn variant_a_racy_slot_keeps_balance() {
    for report in run_many(&variant(Variant::A), 5) {
        assert_eq!(report.final_balance, 100);
        for atm in &report.atms {
            assert_eq!(atm.observed.len(), 1);
            assert!(matches!(atm.observed[0], 0 | 100), "observed {:?}", atm.observed);
        }
    }
}

#[test]
fn variant_b_applies_both_withdrawals() {
    for report in run_many(&variant(Variant::B), 5) {
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.final_balance, -40);
        assert_eq!(report.lost_updates(), 0);
        for atm in &report.atms {
            assert_eq!(atm.requests, 1, "each ATM withdraws once");
            assert_eq!(atm.observed.first(), Some(&100));
            assert_eq!(atm.balance, Some(-40), "last broadcast reaches every ATM");
        }
        assert_eq!(report.bank.received, 2);
    }
}

#[test]
fn variant_b_custom_withdrawal() {
    let config = ScenarioConfig { initial_balance: 50, withdrawal: 30, ..variant(Variant::B) };
    let report = &run_many(&config, 1)[0];
    assert_eq!(report.final_balance, -10);
    assert_eq!(report.expected_balance(), -10);
}
