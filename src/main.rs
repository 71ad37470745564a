//! `license-ledger`: record dependency license snapshots and detect drift.
//!
//! # Flow
//! 1. Parse CLI arguments ([`cli`]).
//! 2. Load and validate config ([`config::load_config`]); flags override the file.
//! 3. Pick the enabled sources from the [`sources::registry::Registry`].
//! 4. Enumerate and reconcile every source against the cache ([`reconcile::Engine`]).
//! 5. Render the report ([`report`]) as terminal output or JSON.
//! 6. Exit `0` (clean), `1` (review required or scan incomplete) or `2` (scan failed).

mod cache;
mod cli;
mod config;
mod error;
mod fingerprint;
mod licenses;
mod models;
mod policy;
mod reconcile;
mod report;
mod sources;

use std::future::Future;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;
use tracing_subscriber::EnvFilter;

use cache::CacheStore;
use cli::{Cli, Command, ReportFormat, ScanArgs};
use config::load_config;
use reconcile::{Engine, Mode, Options};
use sources::registry::Registry;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let args = cli.command.args();

    let default_filter = if args.verbose {
        "license_ledger=debug,warn"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mode = match cli.command {
        Command::Status(_) => Mode::Status,
        Command::Cache(_) => Mode::Cache,
    };

    match run_to_completion(run(mode, args)) {
        Ok(Ok(code)) => ExitCode::from(code),
        Ok(Err(e)) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("failed to start the async runtime: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Drive `future` on a fresh multi-threaded runtime.
///
/// Blocking enumerations abandoned after a source timeout are not waited for,
/// so the process exits as soon as the report is written.
fn run_to_completion<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

async fn run(mode: Mode, args: &ScanArgs) -> Result<u8> {
    // Resolve project path
    let path = args
        .path
        .canonicalize()
        .unwrap_or_else(|_| args.path.clone());

    let registry = Registry::builtin();
    let mut config = load_config(&path, args.config.as_deref())?;
    config.validate(&registry)?;
    if let Some(only) = &args.sources {
        config.restrict_sources(&registry, only)?;
    }
    if args.prune {
        config.prune = true;
    }
    if args.timeout.is_some() {
        config.source_timeout = args.timeout;
        config.validate(&registry)?;
    }

    let handles = registry.enabled_sources(&config.sources, |source_type| {
        config.source_context(&path, source_type)
    });
    if handles.is_empty() {
        eprintln!(
            "No enabled dependency sources apply to {}",
            path.display()
        );
        return Ok(2);
    }

    if !args.quiet {
        let names: Vec<&str> = handles.iter().map(|h| h.type_name()).collect();
        eprintln!("  {} scanning {}", "→".cyan(), names.join(", "));
    }

    let progress = progress_bar(handles.len(), args.quiet)?;
    let engine = Engine::new(
        CacheStore::new(config.cache_root(&path)),
        config.license_policy(),
        Options {
            mode,
            prune: config.prune,
            source_timeout: config.source_timeout(),
        },
    )?;
    let tick = progress.clone();
    let report = engine
        .run(handles, move |source_type| {
            if let Some(pb) = &tick {
                pb.set_message(source_type.to_string());
                pb.inc(1);
            }
        })
        .await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    render(&report, &path, args)?;
    Ok(report.exit_code())
}

fn progress_bar(len: usize, quiet: bool) -> Result<Option<ProgressBar>> {
    if quiet {
        return Ok(None);
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(Some(pb))
}

fn render(report: &reconcile::Report, path: &Path, args: &ScanArgs) -> Result<()> {
    match args.report {
        ReportFormat::Terminal => report::terminal::render(report, path, args.verbose, args.quiet),
        ReportFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
            Ok(())
        }
    }
}
