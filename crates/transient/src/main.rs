//! Transient CLI - retry flaky commands under a transient-fault policy
//!
//! This is the main entry point for the transient command-line interface.

mod cli;
mod commands;
mod output;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use transient_core::retry::{set_fault_observer, TransientFaultEvidence};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI args
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose, cli.quiet);

    // Every executor without its own observer reports exhausted retries here
    set_fault_observer(Some(Arc::new(|evidence: &TransientFaultEvidence| {
        tracing::warn!(
            operation = %evidence.operation,
            attempts = evidence.attempt_index + 1,
            total_wait_ms = evidence.total_wait.as_millis() as u64,
            latency_ms = evidence.latency.as_millis() as u64,
            "transient fault persisted after every retry"
        );
    })));

    // Run command
    match cli.command {
        Commands::Run(args) => commands::run::run(args, &cli.operation, cli.quiet).await,
        Commands::Config(command) => commands::config::run(command),
        Commands::Version(args) => commands::version::run(args),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
