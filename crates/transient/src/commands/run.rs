//! Run command
//!
//! Spawns an external command under the effective retry settings. A
//! non-zero exit status is an attempt failure; the exit codes listed with
//! `--transient-codes` (or every code, when none are listed) are retried.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use transient_core::retry::{
    OperationPredicate, RetryError, RetryExecutor, RetryPolicy, RetryPredicate,
    TransientFaultEvidence,
};
use transient_core::types::RetrySettings;
use transient_core::HierarchicalConfigLoader;

use crate::cli::RunArgs;
use crate::output;

/// Why a single run of the command failed
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The program could not be started
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exited with a non-zero status
    #[error("'{program}' exited with status {code}")]
    Exit { program: String, code: i32 },

    /// The program was terminated without an exit code
    #[error("'{program}' was terminated by a signal")]
    Signal { program: String },
}

impl CommandError {
    fn from_status(program: &str, status: ExitStatus) -> Option<Self> {
        if status.success() {
            return None;
        }
        Some(match status.code() {
            Some(code) => CommandError::Exit {
                program: program.to_string(),
                code,
            },
            None => CommandError::Signal {
                program: program.to_string(),
            },
        })
    }
}

/// Classifies command failures by exit code
///
/// Spawn failures are permanent. Signals are transient.
#[derive(Debug, Clone, Default)]
pub struct TransientExitCodes {
    codes: Vec<i32>,
}

impl TransientExitCodes {
    /// An empty list makes every non-zero exit code transient
    pub fn new(codes: Vec<i32>) -> Self {
        Self { codes }
    }
}

impl RetryPredicate<CommandError> for TransientExitCodes {
    fn should_retry(&self, error: &CommandError) -> bool {
        match error {
            CommandError::Spawn { .. } => false,
            CommandError::Exit { code, .. } => self.codes.is_empty() || self.codes.contains(code),
            CommandError::Signal { .. } => true,
        }
    }
}

/// Outcome of a `transient run` invocation
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub operation: String,
    pub command: Vec<String>,
    pub succeeded: bool,
    /// Times the command was actually started
    pub invocations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<TransientFaultEvidence>,
}

pub async fn run(args: RunArgs, operation: &str, quiet: bool) -> Result<()> {
    let loader = HierarchicalConfigLoader::new()?;
    let config = loader
        .load_runtime_config()
        .context("Failed to load runtime configuration")?;

    let mut settings = config.policy_for(operation).clone();
    apply_overrides(&mut settings, &args);
    tracing::debug!(
        "Effective retry settings for '{}': {:?}",
        operation,
        settings
    );

    let policy = build_policy(&settings, &args.transient_codes)?;
    let executor = RetryExecutor::named(operation, policy);

    let (program, program_args) = args
        .command
        .split_first()
        .map(|(program, rest)| (program.clone(), rest.to_vec()))
        .ok_or_else(|| anyhow!("No command given"))?;

    let invocations = Arc::new(AtomicU32::new(0));
    let result = if args.blocking {
        let invocations = invocations.clone();
        tokio::task::spawn_blocking(move || {
            executor.execute_action_blocking(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                run_blocking(&program, &program_args)
            })
        })
        .await
        .context("Blocking executor panicked")?
    } else {
        executor
            .execute_action(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                run_async(&program, &program_args)
            })
            .await
    };

    let report = RunReport {
        operation: operation.to_string(),
        command: args.command.clone(),
        succeeded: result.is_ok(),
        invocations: invocations.load(Ordering::SeqCst),
        error: result.as_ref().err().map(|e| e.to_string()),
        evidence: result
            .as_ref()
            .err()
            .and_then(RetryError::aggregate)
            .filter(|aggregate| aggregate.budget_exhausted())
            .map(|aggregate| aggregate.evidence().clone()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !quiet {
        print_report(&report);
    }

    match result {
        Ok(()) => Ok(()),
        Err(err) => Err(anyhow!(err).context(format!("Operation '{}' failed", operation))),
    }
}

/// Layer command-line flags over the configured settings
fn apply_overrides(settings: &mut RetrySettings, args: &RunArgs) {
    if let Some(max_attempts) = args.max_attempts {
        settings.max_attempts = max_attempts;
        settings.recovery_enabled = true;
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }
    if let Some(initial_delay_ms) = args.initial_delay_ms {
        settings.initial_delay_ms = initial_delay_ms;
        settings.max_delay_ms = settings.max_delay_ms.max(initial_delay_ms);
    }
    if let Some(max_latency_ms) = args.max_latency_ms {
        settings.max_latency_ms = Some(max_latency_ms);
    }
    if args.no_recovery {
        settings.recovery_enabled = false;
    }
}

fn build_policy(settings: &RetrySettings, transient_codes: &[i32]) -> Result<RetryPolicy<CommandError>> {
    let policy = settings
        .policy_builder()?
        .detection_strategy(OperationPredicate::new(TransientExitCodes::new(
            transient_codes.to_vec(),
        )))
        .build();
    Ok(policy)
}

async fn run_async(program: &str, args: &[String]) -> Result<(), CommandError> {
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    CommandError::from_status(program, status).map_or(Ok(()), Err)
}

fn run_blocking(program: &str, args: &[String]) -> Result<(), CommandError> {
    let status = std::process::Command::new(program)
        .args(args)
        .status()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    CommandError::from_status(program, status).map_or(Ok(()), Err)
}

fn print_report(report: &RunReport) {
    if report.succeeded {
        output::success(&format!(
            "{} succeeded after {} invocation(s)",
            report.operation, report.invocations
        ));
        return;
    }

    if let Some(error) = &report.error {
        output::error(error);
    }
    if let Some(evidence) = &report.evidence {
        output::header("Transient fault evidence");
        output::kv("Operation", &evidence.operation);
        output::kv("Attempts", &(evidence.attempt_index + 1).to_string());
        output::kv("Last wait", &format!("{}ms", evidence.last_wait.as_millis()));
        output::kv("Total wait", &format!("{}ms", evidence.total_wait.as_millis()));
        output::kv("Latency", &format!("{}ms", evidence.latency.as_millis()));
    } else {
        output::warning("Not retried: the failure is permanent or recovery is disabled");
    }
}
