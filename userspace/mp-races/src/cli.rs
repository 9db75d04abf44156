// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command-line front end: run a scenario N times and summarize the balances.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use thiserror::Error;

use crate::config::{ConfigError, Consistency, JitterRange, ScenarioConfig, Variant};
use crate::scenario::{Scenario, ScenarioError, ScenarioReport};

/// Command-line arguments of `mp-races`.
#[derive(Debug, Parser)]
#[command(name = "mp-races", about = "Runs bank/ATM race scenarios on an in-process fabric")]
pub struct Args {
    /// Scenario TOML file; flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Protocol variant.
    #[arg(long, value_enum)]
    pub variant: Option<Variant>,
    /// Number of independent runs.
    #[arg(long, default_value_t = 1)]
    pub runs: u32,
    /// Variant C round trips per ATM (defaults to 1 without a config file).
    #[arg(long)]
    pub rounds: Option<u32>,
    /// Delivery jitter as `MIN..MAX` microseconds.
    #[arg(long, value_parser = parse_jitter)]
    pub jitter_us: Option<JitterRange>,
    /// Use the fixed single-request decrement in Variant C.
    #[arg(long)]
    pub atomic: bool,
    /// Base seed; run `i` uses `seed + i`.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Arguments did not parse.
    #[error("{0}")]
    Usage(#[from] clap::Error),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A run failed.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

impl Args {
    /// Resolves the scenario configuration: file (or defaults), then flags.
    ///
    /// Flag overrides are validated when the scenario is built.
    pub fn to_config(&self) -> Result<ScenarioConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ScenarioConfig::load(path)?,
            None => ScenarioConfig { rounds: Some(1), ..ScenarioConfig::default() },
        };
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = Some(rounds);
        }
        if let Some(jitter) = self.jitter_us {
            config.jitter = Some(jitter);
        }
        if self.atomic {
            config.consistency = Consistency::Atomic;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

fn parse_jitter(value: &str) -> Result<JitterRange, String> {
    let (min, max) =
        value.split_once("..").ok_or_else(|| format!("expected MIN..MAX, got `{value}`"))?;
    let min_us = min.trim().parse::<u64>().map_err(|err| format!("bad minimum `{min}`: {err}"))?;
    let max_us = max.trim().parse::<u64>().map_err(|err| format!("bad maximum `{max}`: {err}"))?;
    if min_us > max_us {
        return Err(format!("minimum {min_us} exceeds maximum {max_us}"));
    }
    Ok(JitterRange { min_us, max_us })
}

/// Aggregate over several runs.
#[derive(Debug, Default)]
pub struct Summary {
    /// Final balance -> number of runs that ended there.
    pub balances: BTreeMap<i32, u32>,
    /// Runs whose final balance exceeds the expected one.
    pub runs_with_lost_updates: u32,
    /// Lost balance units over all runs.
    pub lost_units: u64,
    /// Runs with a failed node or a timeout.
    pub unclean_runs: u32,
    /// Runs recorded.
    pub runs: u32,
}

impl Summary {
    /// Adds one run.
    pub fn record(&mut self, report: &ScenarioReport) {
        self.runs += 1;
        *self.balances.entry(report.final_balance).or_default() += 1;
        let lost = report.lost_updates();
        if lost > 0 {
            self.runs_with_lost_updates += 1;
            self.lost_units += lost;
        }
        if !report.is_clean() {
            self.unclean_runs += 1;
        }
    }

    /// Human-readable rendering.
    pub fn render(&self, config: &ScenarioConfig) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "variant {:?} ({:?}), {} runs, initial balance {}",
            config.variant, config.consistency, self.runs, config.initial_balance
        );
        let histogram: Vec<String> =
            self.balances.iter().map(|(balance, count)| format!("{balance} x{count}")).collect();
        let _ = writeln!(out, "final balances: {}", histogram.join(", "));
        let _ = writeln!(
            out,
            "runs with lost updates: {} (lost units: {})",
            self.runs_with_lost_updates, self.lost_units
        );
        let _ = write!(out, "unclean runs: {}", self.unclean_runs);
        out
    }
}

/// Returns the CLI usage string.
pub fn help() -> String {
    Args::command().render_help().to_string()
}

/// Executes the CLI with `args` (program name excluded) and returns the summary.
pub fn execute(args: &[&str]) -> Result<String, CliError> {
    let argv = core::iter::once("mp-races").chain(args.iter().copied());
    let args = match Args::try_parse_from(argv) {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            return Ok(err.to_string());
        }
        Err(err) => return Err(err.into()),
    };
    let scenario = Scenario::new(args.to_config()?)?;
    let base_seed = scenario.config().seed;
    let mut summary = Summary::default();
    for run in 0..args.runs {
        let report = scenario.with_seed(base_seed.wrapping_add(u64::from(run))).run()?;
        summary.record(&report);
    }
    Ok(summary.render(scenario.config()))
}

/// Parses `std::env::args`, runs, and prints the summary.
pub fn run() -> ExitCode {
    let owned: Vec<String> = std::env::args().skip(1).collect();
    let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
    match execute(&refs) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("mp-races: {err}");
            ExitCode::FAILURE
        }
    }
}
