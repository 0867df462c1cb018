// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use keyroll::{
    config::KeyrollConfig,
    constants::{DEFAULT_CONFIG_PATH, DEFAULT_KEYGEN_TIMEOUT_SECS, DEFAULT_WATCH_INTERVAL},
    duration::parse_duration,
    keygen::DnssecKeygen,
    metrics::write_metrics_file,
    ownership::KeyOwnership,
    provider::{ConvergeReport, KeyProvider},
};
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};

/// Keep BIND9 key directories supplied with DNSSEC keys.
#[derive(Clone, Debug, Parser)]
#[command(name = "keyroll", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Report format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Only process the key resources with these names
    #[arg(short, long = "key", global = true)]
    keys: Vec<String>,

    /// Key generation executable, overrides `settings.keygen_path`
    #[arg(long, global = true)]
    keygen_path: Option<PathBuf>,

    /// Key generation timeout, overrides `settings.keygen_timeout`
    #[arg(long, global = true)]
    keygen_timeout: Option<String>,

    /// Prometheus textfile, overrides `settings.metrics_file`
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Run one convergence pass: purge, create and remove keys as configured
    Converge,
    /// Show what a convergence pass would do without changing anything
    Status,
    /// Run convergence passes periodically until interrupted
    Watch {
        /// Time between passes, e.g. `1h` or `30mi`
        #[arg(short, long, default_value = DEFAULT_WATCH_INTERVAL)]
        interval: String,
    },
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// One line of a pass report.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum PassEntry {
    Report(ConvergeReport),
    Failed { name: String, error: String },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "keyroll", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    init_logging();
    debug!("Logging initialized with file and line number tracking");

    match &cli.command {
        Command::Converge => Ok(exit_code(run_pass(&cli, false)?)),
        Command::Status => Ok(exit_code(run_pass(&cli, true)?)),
        Command::Watch { interval } => {
            let interval = parse_duration(interval)
                .with_context(|| format!("Invalid watch interval '{interval}'"))?;
            if interval.is_zero() {
                anyhow::bail!("Watch interval must be greater than zero");
            }

            let runtime = tokio::runtime::Builder::new_current_thread()
                .thread_name("keyroll-watch")
                .enable_all()
                .build()?;
            runtime.block_on(watch_until(&cli, interval, shutdown_signal()))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

// Format: timestamp file:line LEVEL message
//
// Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT (text or json).
// Logs go to stderr so reports on stdout stay machine readable.
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

fn exit_code(failures: usize) -> ExitCode {
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Build the key provider from the configuration settings and CLI overrides.
fn build_provider(cli: &Cli, config: &KeyrollConfig, dry_run: bool) -> Result<KeyProvider<DnssecKeygen>> {
    let settings = &config.settings;

    let program = cli
        .keygen_path
        .clone()
        .unwrap_or_else(|| settings.keygen_path.clone());

    let timeout = match (&cli.keygen_timeout, &settings.keygen_timeout) {
        (Some(value), _) => parse_duration(value)?,
        (None, Some(value)) => parse_duration(&value.to_string())?,
        (None, None) => Duration::from_secs(DEFAULT_KEYGEN_TIMEOUT_SECS),
    };

    let ownership = KeyOwnership::from_settings(settings.owner.as_deref(), settings.group.as_deref());

    Ok(KeyProvider::new(DnssecKeygen::new(program, timeout))
        .with_ownership(ownership)
        .with_dry_run(dry_run))
}

/// Run one pass over all selected key resources and print the report.
///
/// Returns the number of resources that failed hard.
fn run_pass(cli: &Cli, dry_run: bool) -> Result<usize> {
    let config = KeyrollConfig::load(&cli.config)?;
    let provider = build_provider(cli, &config, dry_run)?;

    for name in &cli.keys {
        if !config.keys.iter().any(|resource| &resource.name == name) {
            anyhow::bail!("No key resource named '{name}' in {}", cli.config.display());
        }
    }

    let now = Utc::now();
    info!(
        "Starting {} pass over {} key resources",
        if dry_run { "status" } else { "convergence" },
        config.keys.len()
    );

    let mut entries = Vec::new();
    let mut failures = 0;

    for resource in &config.keys {
        if !cli.keys.is_empty() && !cli.keys.contains(&resource.name) {
            continue;
        }
        match provider.converge(resource, now) {
            Ok(report) => entries.push(PassEntry::Report(report)),
            Err(e) => {
                failures += 1;
                entries.push(PassEntry::Failed {
                    name: resource.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    print_entries(&entries, cli.output)?;

    let metrics_file = cli
        .metrics_file
        .as_ref()
        .or(config.settings.metrics_file.as_ref());
    if let Some(path) = metrics_file.filter(|_| !dry_run) {
        write_metrics_file(path)?;
        debug!("Wrote metrics to {}", path.display());
    }

    if failures > 0 {
        error!("{failures} key resources failed");
    }
    Ok(failures)
}

fn print_entries(entries: &[PassEntry], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(entries)?);
        }
        OutputFormat::Text => {
            for entry in entries {
                match entry {
                    PassEntry::Report(report) => println!("{report}"),
                    PassEntry::Failed { name, error } => println!("{name}: failed: {error}"),
                }
            }
        }
    }
    Ok(())
}

/// Run passes every `interval` until `shutdown` completes.
///
/// The configuration is re-read for every pass; a pass that cannot run is
/// logged and retried at the next tick. Passes run on the blocking pool
/// because key generation drives its own runtime.
async fn watch_until(
    cli: &Cli,
    interval: Duration,
    shutdown: impl Future<Output = Result<()>>,
) -> Result<()> {
    info!("Watching key resources every {}s", interval.as_secs());

    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutdown complete");
                return Ok(());
            }
            _ = ticker.tick() => {
                let pass_cli = cli.clone();
                match tokio::task::spawn_blocking(move || run_pass(&pass_cli, false)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!("Convergence pass failed: {e:#}"),
                    Err(e) => error!("Convergence pass aborted: {e}"),
                }
            }
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}
