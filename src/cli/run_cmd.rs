// Copyright 2024-2026 batchpool Contributors
// SPDX-License-Identifier: Apache-2.0

//! `run` subcommand: execute a synthetic batch and stream its outcomes.
//!
//! Each item sleeps for a random delay and then succeeds, fails or panics
//! according to the requested rates. Useful for exercising timeouts, the
//! admission gate and abort-on-first-error from a shell.

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{cancel_on_ctrl_c, join_background, CliError};
use crate::config::{self, BatchConfig};
use crate::pool::{AdmissionGate, BatchRunner, ItemContext, Outcome, WorkItem};
use crate::telemetry::StatsSnapshot;

/// Parsed `run` options.
#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub items: usize,
    pub max_delay: Duration,
    pub fail_rate: f64,
    pub panic_rate: f64,
    pub gate: Option<usize>,
    pub json: bool,
    pub config_file: Option<PathBuf>,
    /// Flags given on the command line; they win over file and env.
    pub overrides: BatchConfig,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            items: 100,
            max_delay: Duration::from_millis(50),
            fail_rate: 0.0,
            panic_rate: 0.0,
            gate: None,
            json: false,
            config_file: None,
            overrides: BatchConfig::default(),
        }
    }
}

impl RunArgs {
    /// Parse options following the `run` keyword.
    pub fn parse(args: &[String]) -> Result<Self, CliError> {
        let mut parsed = Self::default();
        let mut iter = args.iter();

        while let Some(flag) = iter.next() {
            let flag = flag.as_str();
            match flag {
                "--json" => parsed.json = true,
                "--abort-on-error" => parsed.overrides.abort_on_first_error = true,
                "--items" => parsed.items = parse_value(flag, iter.next())?,
                "--workers" => {
                    let value = require(flag, iter.next())?;
                    parsed.overrides.workers = if value == "auto" {
                        num_cpus::get()
                    } else {
                        parse_str(flag, value)?
                    };
                }
                "--item-timeout-ms" => {
                    parsed.overrides.item_timeout =
                        Duration::from_millis(parse_value(flag, iter.next())?);
                }
                "--batch-timeout-ms" => {
                    parsed.overrides.batch_timeout =
                        Duration::from_millis(parse_value(flag, iter.next())?);
                }
                "--max-delay-ms" => {
                    parsed.max_delay = Duration::from_millis(parse_value(flag, iter.next())?);
                }
                "--fail-rate" => parsed.fail_rate = parse_rate(flag, iter.next())?,
                "--panic-rate" => parsed.panic_rate = parse_rate(flag, iter.next())?,
                "--gate" => parsed.gate = Some(parse_value(flag, iter.next())?),
                "--config" => parsed.config_file = Some(PathBuf::from(require(flag, iter.next())?)),
                other => return Err(CliError::UnknownOption(other.to_string())),
            }
        }

        Ok(parsed)
    }

    /// File, then env, then command-line flags.
    pub fn batch_config(&self) -> Result<BatchConfig, CliError> {
        let base = match &self.config_file {
            Some(path) => config::load_file(path)?,
            None => BatchConfig::default(),
        };
        let mut merged = config::overlay_env(base);
        let flags = &self.overrides;
        if flags.workers != 0 {
            merged.workers = flags.workers;
        }
        if !flags.item_timeout.is_zero() {
            merged.item_timeout = flags.item_timeout;
        }
        if !flags.batch_timeout.is_zero() {
            merged.batch_timeout = flags.batch_timeout;
        }
        merged.abort_on_first_error |= flags.abort_on_first_error;
        Ok(merged)
    }
}

fn require<'a>(flag: &str, value: Option<&'a String>) -> Result<&'a str, CliError> {
    value
        .map(String::as_str)
        .ok_or_else(|| CliError::MissingValue(flag.to_string()))
}

fn parse_str<V: std::str::FromStr>(flag: &str, value: &str) -> Result<V, CliError> {
    value.parse().map_err(|_| CliError::InvalidValue {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn parse_value<V: std::str::FromStr>(flag: &str, value: Option<&String>) -> Result<V, CliError> {
    parse_str(flag, require(flag, value)?)
}

fn parse_rate(flag: &str, value: Option<&String>) -> Result<f64, CliError> {
    let raw = require(flag, value)?;
    let rate: f64 = parse_str(flag, raw)?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(CliError::InvalidValue {
            flag: flag.to_string(),
            value: raw.to_string(),
        })
    }
}

/// What a synthetic item will do once it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Synthetic payload: sleep, then behave.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticTask {
    pub delay: Duration,
    pub behavior: Behavior,
}

/// Draw the whole workload up front so the operation itself stays
/// deterministic per item.
pub fn synthetic_items(args: &RunArgs) -> Vec<WorkItem<usize, SyntheticTask>> {
    let mut rng = rand::thread_rng();
    let max_delay_ms = config::millis(args.max_delay);
    (0..args.items)
        .map(|id| {
            let delay = Duration::from_millis(rng.gen_range(0..=max_delay_ms));
            let roll: f64 = rng.gen();
            let behavior = if roll < args.panic_rate {
                Behavior::Panic
            } else if roll < args.panic_rate + args.fail_rate {
                Behavior::Fail
            } else {
                Behavior::Succeed
            };
            WorkItem::new(id, SyntheticTask { delay, behavior })
        })
        .collect()
}

/// The operation used by `run`: honours cancellation while sleeping.
pub async fn synthetic_operation(ctx: ItemContext, task: SyntheticTask) -> Result<u64, String> {
    tokio::select! {
        () = ctx.cancelled() => return Err("cancelled while working".to_string()),
        () = tokio::time::sleep(task.delay) => {}
    }
    match task.behavior {
        Behavior::Succeed => Ok(config::millis(task.delay)),
        Behavior::Fail => Err(format!("synthetic failure after {}ms", task.delay.as_millis())),
        Behavior::Panic => panic!("synthetic panic"),
    }
}

/// Run `run` with parsed args. Returns 0 if every item succeeded, 1 if any
/// did not, 2 on a configuration error.
pub async fn run_synthetic(args: RunArgs) -> i32 {
    let config = match args.batch_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return 2;
        }
    };

    let mut runner = BatchRunner::new(config);
    if let Some(capacity) = args.gate {
        runner = runner.with_gate(AdmissionGate::new(capacity));
    }

    let parent = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(parent.clone());

    let mut stream = runner.run(&parent, synthetic_items(&args), synthetic_operation);
    while let Some(outcome) = stream.recv().await {
        print_outcome(&outcome, args.json);
    }
    let stats = stream.stats();
    print_summary(&stats, args.json);

    parent.cancel();
    join_background("ctrl-c watcher", watcher).await;

    if stats.succeeded == stats.submitted {
        0
    } else {
        1
    }
}

fn print_outcome(outcome: &Outcome<usize, u64, String>, json_output: bool) {
    let kind = outcome.kind();
    if json_output {
        let line = match &outcome.result {
            Ok(value) => json!({ "id": outcome.id, "kind": kind.as_str(), "value": value }),
            Err(e) => json!({ "id": outcome.id, "kind": kind.as_str(), "error": e.to_string() }),
        };
        println!("{}", line);
    } else {
        match &outcome.result {
            Ok(value) => println!("{:>6}  {:<10} {}ms", outcome.id, kind, value),
            Err(e) => println!("{:>6}  {:<10} {}", outcome.id, kind, e),
        }
    }
}

fn print_summary(stats: &StatsSnapshot, json_output: bool) {
    if json_output {
        match serde_json::to_string(stats) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode summary: {}", e),
        }
        return;
    }
    println!("{}", "-".repeat(40));
    println!(
        "submitted {}  delivered {}  invoked {}",
        stats.submitted, stats.delivered, stats.invoked
    );
    println!(
        "success {}  failed {}  timed_out {}  panicked {}  skipped {}",
        stats.succeeded, stats.failed, stats.timed_out, stats.panicked, stats.skipped
    );
    println!(
        "latency mean {:.1}ms  max {:.1}ms",
        stats.latency.mean() * 1000.0,
        stats.latency.max * 1000.0
    );
}
