// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Role dispatch by node id inside full scenarios
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: 3 integration tests
//!
//! TEST_SCENARIOS:
//!   - default_roles(): node 0 banks, nodes 1 and 2 run identical ATM logic
//!   - undriven_ids_have_no_role(): ids outside the topology are left alone
//!   - passive_receiver_stays_quiet(): passive node is attached but unused by Variant C

use fabric_ipc::NodeId;
use mp_races::{Role, ScenarioConfig, Topology};
use races_e2e::{run_many, variant_c};

#[test]
fn default_roles() {
    let report = &run_many(&variant_c(2), 1)[0];
    assert_eq!(report.bank.node, NodeId::new(0));
    assert_eq!(report.bank.role, Role::Bank);
    let atms: Vec<_> = report.atms.iter().map(|atm| (atm.node, atm.role, atm.requests)).collect();
    assert_eq!(atms, vec![(NodeId::new(1), Role::Atm, 2), (NodeId::new(2), Role::Atm, 2)]);
}

#[test]
fn undriven_ids_have_no_role() {
    let topology = Topology::default();
    for id in 3..=31 {
        assert_eq!(Role::for_node(&topology, NodeId::new(id)), None);
    }
}

#[test]
fn passive_receiver_stays_quiet() {
    let topology = Topology { passive: vec![NodeId::new(7)], ..Topology::default() };
    let config = ScenarioConfig { topology, ..variant_c(1) };
    let report = &run_many(&config, 1)[0];
    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.passive.len(), 1);
    assert_eq!(report.passive[0].role, Role::PassiveReceiver);
    assert_eq!(report.passive[0].received, 0);
}
