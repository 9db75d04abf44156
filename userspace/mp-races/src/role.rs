// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Role dispatch: which behaviour a node runs, as a pure function of its id.

use core::fmt;

use fabric_ipc::NodeId;
use serde::Deserialize;

/// Behaviour assigned to a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Owns the balance and serves requests.
    Bank,
    /// Issues balance requests against the bank.
    Atm,
    /// Drains and logs its inbox.
    PassiveReceiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bank => "bank",
            Self::Atm => "atm",
            Self::PassiveReceiver => "passive",
        })
    }
}

/// Deployment topology: node ids per role.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Topology {
    /// Bank node.
    pub bank: NodeId,
    /// ATM nodes, all running identical logic.
    pub atms: Vec<NodeId>,
    /// Passive receivers.
    pub passive: Vec<NodeId>,
}

impl Default for Topology {
    fn default() -> Self {
        Self { bank: NodeId::new(0), atms: vec![NodeId::new(1), NodeId::new(2)], passive: Vec::new() }
    }
}

impl Topology {
    /// Every driven node: bank first, then ATMs, then passive receivers.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, Role)> + '_ {
        core::iter::once((self.bank, Role::Bank))
            .chain(self.atms.iter().map(|id| (*id, Role::Atm)))
            .chain(self.passive.iter().map(|id| (*id, Role::PassiveReceiver)))
    }

    /// Number of driven nodes.
    pub fn len(&self) -> usize {
        1 + self.atms.len() + self.passive.len()
    }

    /// Always `false`: a topology has at least its bank.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Role {
    /// Role of `id` under `topology`; `None` for ids the topology does not drive.
    pub fn for_node(topology: &Topology, id: NodeId) -> Option<Self> {
        if id == topology.bank {
            Some(Self::Bank)
        } else if topology.atms.contains(&id) {
            Some(Self::Atm)
        } else if topology.passive.contains(&id) {
            Some(Self::PassiveReceiver)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn default_topology_dispatch() {
        let topology = Topology::default();
        assert_eq!(Role::for_node(&topology, NodeId::new(0)), Some(Role::Bank));
        assert_eq!(Role::for_node(&topology, NodeId::new(1)), Some(Role::Atm));
        assert_eq!(Role::for_node(&topology, NodeId::new(2)), Some(Role::Atm));
        for id in 3..=31 {
            assert_eq!(Role::for_node(&topology, NodeId::new(id)), None);
        }
    }

    #[test]
    fn nodes_lists_bank_first() {
        let topology = Topology { passive: vec![NodeId::new(5)], ..Topology::default() };
        let roles: Vec<_> = topology.nodes().collect();
        assert_eq!(
            roles,
            vec![
                (NodeId::new(0), Role::Bank),
                (NodeId::new(1), Role::Atm),
                (NodeId::new(2), Role::Atm),
                (NodeId::new(5), Role::PassiveReceiver),
            ]
        );
        assert_eq!(topology.len(), 4);
    }

    fn topology_strategy() -> impl Strategy<Value = Topology> {
        proptest::sample::subsequence((0u8..=31).collect::<Vec<_>>(), 2..=32)
            .prop_shuffle()
            .prop_flat_map(|ids| {
                let len = ids.len();
                (Just(ids), 1..len)
            })
            .prop_map(|(ids, split)| {
                let ids: Vec<NodeId> = ids.into_iter().map(NodeId::new).collect();
                Topology {
                    bank: ids[0],
                    atms: ids[1..=split].to_vec(),
                    passive: ids[split + 1..].to_vec(),
                }
            })
    }

    proptest! {
        #[test]
        fn nodes_agree_with_role_dispatch(topology in topology_strategy()) {
            let nodes: Vec<_> = topology.nodes().collect();
            prop_assert_eq!(nodes.len(), topology.len());
            prop_assert_eq!(nodes[0], (topology.bank, Role::Bank));
            let distinct: BTreeSet<_> = nodes.iter().map(|(id, _)| *id).collect();
            prop_assert_eq!(distinct.len(), nodes.len());
            for (id, role) in &nodes {
                prop_assert_eq!(Role::for_node(&topology, *id), Some(*role));
            }
            for raw in 0u8..=31 {
                let id = NodeId::new(raw);
                prop_assert_eq!(Role::for_node(&topology, id).is_some(), distinct.contains(&id));
            }
        }
    }
}
