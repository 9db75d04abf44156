// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the race scenario end-to-end tests.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use log::info;
use mp_races::{JitterRange, Scenario, ScenarioConfig, ScenarioReport};

/// Variant C configuration with `rounds` round trips per ATM.
pub fn variant_c(rounds: u32) -> ScenarioConfig {
    ScenarioConfig { rounds: Some(rounds), ..ScenarioConfig::default() }
}

/// Adds seeded delivery jitter to `config`.
pub fn with_jitter(config: ScenarioConfig, max_us: u64) -> ScenarioConfig {
    ScenarioConfig { jitter: Some(JitterRange { min_us: 0, max_us }), ..config }
}

/// Runs `config` `runs` times, seeding run `i` with `i`, and returns every report.
pub fn run_many(config: &ScenarioConfig, runs: u64) -> Vec<ScenarioReport> {
    (0..runs)
        .map(|seed| {
            let scenario = Scenario::new(ScenarioConfig { seed, ..config.clone() })
                .unwrap_or_else(|err| panic!("invalid scenario: {err}"));
            scenario.run().unwrap_or_else(|err| panic!("run {seed} failed: {err}"))
        })
        .collect()
}

/// Final balance histogram over `reports`.
pub fn histogram(reports: &[ScenarioReport]) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for report in reports {
        *counts.entry(report.final_balance).or_default() += 1;
    }
    info!("final balances: {counts:?}");
    counts
}
