//! Config command

use anyhow::{Context, Result};
use transient_core::types::{RetrySettings, RuntimeConfig};
use transient_core::HierarchicalConfigLoader;

use crate::cli::{ConfigCommands, ConfigShowArgs};
use crate::output;

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show(args) => show(args),
    }
}

fn show(args: ConfigShowArgs) -> Result<()> {
    let loader = HierarchicalConfigLoader::new()?;
    let config = loader
        .load_runtime_config()
        .context("Failed to load runtime configuration")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let path = loader.runtime_config_path();
    println!(
        "Runtime config: {}{}",
        path,
        if path.exists() { "" } else { " (not present)" }
    );
    print_config(&config);
    Ok(())
}

fn print_config(config: &RuntimeConfig) {
    print_settings("default", &config.retry.default);

    let mut operations: Vec<_> = config.retry.operations.iter().collect();
    operations.sort_by(|a, b| a.0.cmp(b.0));
    for (name, settings) in operations {
        print_settings(name, settings);
    }
}

fn print_settings(name: &str, settings: &RetrySettings) {
    output::header(name);
    output::kv("recovery-enabled", &settings.recovery_enabled.to_string());
    output::kv("max-attempts", &settings.max_attempts.to_string());
    output::kv("strategy", &settings.strategy.to_string());
    output::kv("backoff-multiplier", &settings.backoff_multiplier.to_string());
    output::kv("initial-delay-ms", &settings.initial_delay_ms.to_string());
    output::kv("max-delay-ms", &settings.max_delay_ms.to_string());
    output::kv("jitter", &settings.jitter.to_string());
    output::kv(
        "max-latency-ms",
        &settings
            .max_latency_ms
            .map_or_else(|| "unbounded".to_string(), |ms| ms.to_string()),
    );
}
