//! CLI argument parsing with clap

use clap::{Args, Parser, Subcommand};
use transient_core::types::RetryStrategy;

/// Operation name used when none is given on the command line
pub const DEFAULT_OPERATION: &str = "command";

/// Transient - retry flaky commands under a transient-fault policy
#[derive(Parser, Debug)]
#[command(name = "transient")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Operation name used to select retry settings
    #[arg(short, long, global = true, default_value = DEFAULT_OPERATION)]
    pub operation: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command, retrying transient failures
    Run(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show version information
    Version(VersionArgs),
}

// Run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Retries permitted after the first attempt
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Backoff strategy (none, fixed-delay, exponential-backoff, linear-backoff)
    #[arg(long)]
    pub strategy: Option<RetryStrategy>,

    /// Delay before the first retry, in milliseconds
    #[arg(long)]
    pub initial_delay_ms: Option<u64>,

    /// Ceiling on execution time excluding backoff waits, in milliseconds
    #[arg(long)]
    pub max_latency_ms: Option<u64>,

    /// Run the command exactly once
    #[arg(long)]
    pub no_recovery: bool,

    /// Block a worker thread during backoff instead of suspending
    #[arg(long)]
    pub blocking: bool,

    /// Output the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit codes treated as transient (default: every non-zero code)
    #[arg(long, value_delimiter = ',')]
    pub transient_codes: Vec<i32>,

    /// Command to run, after `--`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

// Config commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective runtime configuration
    Show(ConfigShowArgs),
}

#[derive(Args, Debug)]
pub struct ConfigShowArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "transient",
            "-vv",
            "--operation",
            "deploy",
            "run",
            "--max-attempts",
            "4",
            "--strategy",
            "linear",
            "--transient-codes",
            "75,111",
            "--",
            "curl",
            "-f",
            "https://example.com",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.operation, "deploy");
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.max_attempts, Some(4));
        assert_eq!(args.strategy, Some(RetryStrategy::LinearBackoff));
        assert_eq!(args.transient_codes, vec![75, 111]);
        assert_eq!(args.command, vec!["curl", "-f", "https://example.com"]);
        assert!(!args.blocking);
    }

    #[test]
    fn test_parse_run_defaults_operation() {
        let cli = Cli::try_parse_from(["transient", "run", "--", "true"]).unwrap();
        assert_eq!(cli.operation, DEFAULT_OPERATION);
    }

    #[test]
    fn test_run_requires_command() {
        assert!(Cli::try_parse_from(["transient", "run", "--max-attempts", "2"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let result = Cli::try_parse_from(["transient", "run", "--strategy", "sometimes", "--", "true"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["transient", "config", "show", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommands::Show(ConfigShowArgs { json: true }))
        ));
    }
}
