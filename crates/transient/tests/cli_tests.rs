//! Integration tests for the transient CLI
//!
//! Runs the compiled binary with HOME pointed at a temporary directory so the
//! user's own configuration never leaks into the results.

use std::fs;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

// ─── Helpers ───────────────────────────────────────────────────────────────

const ENV_OVERRIDES: &[&str] = &[
    "TRANSIENT_RECOVERY_ENABLED",
    "TRANSIENT_MAX_ATTEMPTS",
    "TRANSIENT_STRATEGY",
    "TRANSIENT_INITIAL_DELAY_MS",
    "TRANSIENT_MAX_DELAY_MS",
    "TRANSIENT_MAX_LATENCY_MS",
];

fn transient(home: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_transient"));
    cmd.env("HOME", home.path()).env("NO_COLOR", "1");
    for var in ENV_OVERRIDES {
        cmd.env_remove(var);
    }
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run transient binary")
}

fn json_stdout(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({}): {}",
            e,
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

// ─── version / config ──────────────────────────────────────────────────────

#[test]
fn test_version_json() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args(["version", "--json"]));

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["name"], "transient");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_config_show_embedded_defaults() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args(["config", "show", "--json"]));

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["retry"]["default"]["recovery-enabled"], false);
    assert_eq!(json["retry"]["default"]["max-attempts"], 0);
    assert_eq!(json["retry"]["operations"]["network"]["max-attempts"], 3);
}

#[test]
fn test_config_show_reads_user_file() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join(".transient");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("transient-runtime.yaml"),
        "retry:\n  default:\n    recovery-enabled: true\n    max-attempts: 8\n",
    )
    .unwrap();

    let output = run(transient(&home).args(["config", "show", "--json"]));

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["retry"]["default"]["max-attempts"], 8);
    assert_eq!(json["retry"]["operations"]["network"]["max-attempts"], 3);
}

#[test]
fn test_config_show_env_override() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home)
        .env("TRANSIENT_MAX_LATENCY_MS", "1500")
        .args(["config", "show", "--json"]));

    assert!(output.status.success());
    assert_eq!(
        json_stdout(&output)["retry"]["default"]["max-latency-ms"],
        1500
    );
}

#[test]
fn test_invalid_env_override_fails() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home)
        .env("TRANSIENT_MAX_ATTEMPTS", "lots")
        .args(["config", "show"]));

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("TRANSIENT_MAX_ATTEMPTS"));
}

// ─── run ───────────────────────────────────────────────────────────────────

#[cfg(unix)]
#[test]
fn test_run_success_single_invocation() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args(["-q", "run", "--json", "--", "true"]));

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["succeeded"], true);
    assert_eq!(json["invocations"], 1);
    assert!(json.get("evidence").is_none());
}

#[cfg(unix)]
#[test]
fn test_run_exhausts_transient_failures() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args([
        "-q",
        "run",
        "--max-attempts",
        "2",
        "--strategy",
        "none",
        "--json",
        "--",
        "false",
    ]));

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["succeeded"], false);
    assert_eq!(json["invocations"], 3);
    assert_eq!(json["evidence"]["attempt_index"], 2);
    assert_eq!(json["evidence"]["operation"], "command");
    assert_eq!(json["evidence"]["total_wait_ms"], 0);
}

#[cfg(unix)]
#[test]
fn test_run_blocking_exhausts_transient_failures() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args([
        "-q",
        "--operation",
        "sync-job",
        "run",
        "--blocking",
        "--max-attempts",
        "1",
        "--strategy",
        "fixed",
        "--initial-delay-ms",
        "5",
        "--json",
        "--",
        "false",
    ]));

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["invocations"], 2);
    assert_eq!(json["evidence"]["operation"], "sync-job");
    assert_eq!(json["evidence"]["total_wait_ms"], 5);
}

#[cfg(unix)]
#[test]
fn test_run_permanent_exit_code_is_not_retried() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args([
        "-q",
        "run",
        "--max-attempts",
        "3",
        "--strategy",
        "none",
        "--transient-codes",
        "75",
        "--json",
        "--",
        "false",
    ]));

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["invocations"], 1);
    assert!(json.get("evidence").is_none());
    assert!(json["error"].as_str().unwrap().contains("exited with status 1"));
}

#[cfg(unix)]
#[test]
fn test_run_no_recovery_runs_once() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args([
        "-q",
        "run",
        "--max-attempts",
        "5",
        "--no-recovery",
        "--json",
        "--",
        "false",
    ]));

    assert!(!output.status.success());
    assert_eq!(json_stdout(&output)["invocations"], 1);
}

#[test]
fn test_run_missing_program_is_permanent() {
    let home = TempDir::new().unwrap();
    let output = run(transient(&home).args([
        "-q",
        "run",
        "--max-attempts",
        "3",
        "--json",
        "--",
        "transient-test-no-such-program",
    ]));

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["invocations"], 1);
    assert!(json["error"].as_str().unwrap().contains("failed to start"));
}
