//! `fanout exec` – run a command once per target through the dispatcher.

use anyhow::{Context, Result};
use clap::Args;
use fanout_core::config::FanoutConfig;
use fanout_core::dispatch::{DispatchProgress, RunSummary};
use fanout_core::retry::saturating_millis;
use fanout_core::{Dispatcher, Outcome, ResultSet};
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use crate::cli::runner::{CommandOperation, CommandOutput};

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Read targets from FILE (one per line) instead of stdin.
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Run up to N targets at once (overrides `concurrency` from config).
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Retries per target after the first attempt.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Delay before the first retry; doubles for every further retry.
    #[arg(long, value_name = "MS")]
    pub base_delay_ms: Option<u64>,

    /// Cap a single backoff delay at SECS.
    #[arg(long, value_name = "SECS")]
    pub max_delay_secs: Option<u64>,

    /// Exit code that means "try again" (repeatable; replaces the configured list).
    #[arg(long = "transient-exit-code", value_name = "CODE")]
    pub transient_exit_codes: Vec<i32>,

    /// Print a JSON report instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Program and arguments to run for each target.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl ExecArgs {
    /// Config file values with command-line overrides applied.
    pub fn apply(&self, cfg: &FanoutConfig) -> FanoutConfig {
        let mut cfg = cfg.clone();
        if let Some(jobs) = self.jobs {
            cfg.concurrency = jobs;
        }
        if !self.transient_exit_codes.is_empty() {
            cfg.transient_exit_codes = self.transient_exit_codes.clone();
        }
        if self.max_retries.is_some() || self.base_delay_ms.is_some() || self.max_delay_secs.is_some() {
            let mut retry = cfg.retry.take().unwrap_or_default();
            if let Some(n) = self.max_retries {
                retry.max_retries = n;
            }
            if let Some(ms) = self.base_delay_ms {
                retry.base_delay_ms = ms;
            }
            if self.max_delay_secs.is_some() {
                retry.max_delay_secs = self.max_delay_secs;
            }
            cfg.retry = Some(retry);
        }
        cfg
    }
}

/// One line of the JSON report.
#[derive(Debug, Serialize)]
struct ReportEntry {
    index: usize,
    target: String,
    status: &'static str,
    attempts: u32,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    summary: RunSummary,
    results: Vec<ReportEntry>,
}

/// Non-empty, trimmed lines in input order.
pub fn parse_targets(reader: impl BufRead) -> Result<Vec<String>> {
    let mut targets = Vec::new();
    for line in reader.lines() {
        let line = line.context("read target line")?;
        let line = line.trim();
        if !line.is_empty() {
            targets.push(line.to_string());
        }
    }
    Ok(targets)
}

fn read_targets(input: Option<&Path>) -> Result<Vec<String>> {
    match input {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("open targets file: {}", path.display()))?;
            parse_targets(io::BufReader::new(file))
        }
        None => parse_targets(io::stdin().lock()),
    }
}

fn build_report(targets: &[String], results: ResultSet<CommandOutput>) -> Report {
    let summary = results.summary();
    let results = results
        .into_ordered()
        .into_iter()
        .map(|s| {
            let (status, stdout, error) = match s.outcome {
                Outcome::Fulfilled(out) => ("fulfilled", Some(out.stdout), None),
                Outcome::Rejected(r) => ("rejected", None, Some(r.to_string())),
            };
            ReportEntry {
                index: s.index,
                target: targets[s.index].clone(),
                status,
                attempts: s.attempts,
                elapsed_ms: saturating_millis(s.elapsed),
                stdout,
                error,
            }
        })
        .collect();
    Report { summary, results }
}

fn print_table(report: &Report) {
    println!("{:<6} {:<10} {:<8} {}", "INDEX", "STATUS", "ATTEMPTS", "TARGET");
    for r in &report.results {
        println!("{:<6} {:<10} {:<8} {}", r.index, r.status, r.attempts, r.target);
        if let Some(err) = &r.error {
            println!("       {}", err);
        }
    }
    let s = &report.summary;
    println!(
        "{} targets: {} fulfilled, {} rejected ({} exhausted retries), {} attempts in {:.1}s",
        s.total,
        s.fulfilled,
        s.rejected,
        s.exhausted,
        s.attempts,
        s.elapsed_ms as f64 / 1000.0
    );
}

pub async fn run_exec(cfg: &FanoutConfig, args: ExecArgs) -> Result<()> {
    let cfg = args.apply(cfg);
    let targets = read_targets(args.input.as_deref())?;
    let Some((program, rest)) = args.command.split_first() else {
        anyhow::bail!("no command given");
    };
    let operation = CommandOperation::new(
        program.clone(),
        rest.to_vec(),
        cfg.transient_exit_codes.clone(),
    );

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel::<DispatchProgress>(16);
    let show_progress = !args.json;
    let progress_handle = tokio::spawn(async move {
        while let Some(p) = progress_rx.recv().await {
            if show_progress {
                eprint!(
                    "\r  {}/{} settled ({:.0}%)  {} active  {} failed  ",
                    p.settled,
                    p.total,
                    p.fraction() * 100.0,
                    p.active,
                    p.rejected
                );
            }
        }
        if show_progress {
            eprintln!();
        }
    });

    let dispatcher = Dispatcher::new(operation)
        .with_policy(cfg.retry_policy())
        .with_progress(progress_tx);
    let policy = dispatcher.policy();
    tracing::info!(
        targets = targets.len(),
        program = %program,
        max_retries = policy.max_retries,
        base_delay_ms = saturating_millis(policy.base_delay),
        "exec starting"
    );
    let results = dispatcher.run(targets.clone(), cfg.concurrency).await;
    // Closes the progress channel so the printer task finishes.
    drop(dispatcher);
    let results = results?;
    let _ = progress_handle.await;

    let report = build_report(&targets, results);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }

    if report.summary.rejected > 0 {
        anyhow::bail!(
            "{} of {} targets failed",
            report.summary.rejected,
            report.summary.total
        );
    }
    Ok(())
}
