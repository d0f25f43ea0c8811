//! certrelay - Main entry point
//!
//! Runs one renewal pass over the configured domains and exits. Meant to be
//! scheduled from cron or a systemd timer.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{error, info, warn};

use certrelay_common::{init_tracing, LogSettings};
use certrelay_config::{Config, DEFAULT_CONFIG_FILE};
use certrelay_renewer::{RenewalOrchestrator, RunSummary};

/// certrelay - ACME DNS-01 certificate renewal for Qiniu CDN domains
#[derive(Parser, Debug)]
#[command(name = "certrelay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(
        short = 'c',
        long = "config",
        env = "CERTRELAY_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Test configuration and exit
    #[arg(short = 't', long = "test")]
    test: bool,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            // Logging may not be up yet
            eprintln!("certrelay: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.test {
        println!(
            "certrelay: configuration file {} test is successful ({} domain(s))",
            cli.config.display(),
            config.domains.len()
        );
        return ExitCode::SUCCESS;
    }

    let settings = LogSettings::new(cli.verbose).with_log_file(config.log_file());
    if let Err(e) = init_tracing(&settings) {
        eprintln!("certrelay: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Startup failed");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config.validate()?;
    Ok(config)
}

fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_run(config))
}

async fn async_run(config: Config) -> Result<()> {
    let started = Local::now();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %started.format("%Y-%m-%d %H:%M:%S"),
        "certrelay run starting"
    );

    let domains = &config.domains;
    if domains.is_empty() {
        warn!("No domains configured, nothing to do");
        return Ok(());
    }

    info!(
        domain_count = domains.len(),
        renewal_days_before_expiry = config.renewal_days_before_expiry,
        record_file = %config.record_file.display(),
        "Configuration loaded"
    );

    let mut orchestrator = RenewalOrchestrator::from_config(&config)?;

    tokio::select! {
        summary = orchestrator.run(domains) => {
            log_summary(&summary, started);
        }
        () = wait_for_interrupt(tokio::signal::ctrl_c()) => {
            warn!("Run interrupted");
        }
    }

    Ok(())
}

/// Resolve on Ctrl-C; if the handler cannot be installed, never resolve
async fn wait_for_interrupt(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(error = %e, "Failed to install Ctrl-C handler, run cannot be interrupted");
        std::future::pending::<()>().await;
    }
}

fn log_summary(summary: &RunSummary, started: chrono::DateTime<Local>) {
    let elapsed = Local::now() - started;

    info!(
        total = summary.total(),
        succeeded = summary.succeeded,
        failed = summary.failed,
        elapsed_secs = elapsed.num_seconds(),
        "certrelay run finished"
    );

    for domain in summary.failed_domains() {
        warn!(domain = %domain, "Domain failed this run");
    }
}
