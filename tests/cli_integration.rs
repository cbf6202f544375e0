//! Integration tests for the logtap binary
//!
//! These tests drive the built binary with a throwaway config:
//! - Tapping stdin and echoing bridged events
//! - Event filtering
//! - Property directives
//! - Member listing

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Write a config that keeps logs inside `dir` and echoes plain text
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("logtap.yaml");
    let config = format!(
        "log_dir: {}\ntarget: cli-test\necho:\n  color: false\n  timestamps: false\n{}",
        dir.join("logs").display(),
        extra
    );
    fs::write(&path, config).unwrap();
    path
}

/// Run logtap with `input` on stdin
fn run_logtap(config: &Path, args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_logtap"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute logtap");

    child.stdin.take().unwrap().write_all(input.as_bytes()).unwrap();
    child.wait_with_output().unwrap()
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_tap_echoes_every_call() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_logtap(&config, &["tap"], "warn: disk almost full\nhello world\n\n");
    let stdout = stdout_of(&output);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("warn disk almost full"));
    assert!(stdout.contains("log hello world"));
    assert!(stdout.contains("2 event(s) (warn=1, log=1)"));
}

#[test]
fn test_tap_still_writes_to_log_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_logtap(&config, &["tap"], "error: payment gateway timeout\n");
    assert!(output.status.success());

    let log = fs::read_to_string(dir.path().join("logs").join("logtap.log")).unwrap();
    assert!(log.contains("payment gateway timeout"));
    assert!(log.contains("cli-test"));
}

#[test]
fn test_tap_event_filter_from_command_line() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_logtap(&config, &["tap", "--events", "warn"], "warn: shown\ninfo: hidden\n");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("warn shown"));
    assert!(!stdout.contains("hidden"));
    assert!(stdout.contains("1 event(s) (warn=1)"));
}

#[test]
fn test_tap_repeated_event_is_echoed_once() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_logtap(&config, &["tap", "--events", "warn,warn"], "warn: once\n");
    let stdout = stdout_of(&output);

    assert_eq!(stdout.matches("warn once").count(), 1);
    assert!(stdout.contains("1 event(s) (warn=1)"));
}

#[test]
fn test_tap_event_filter_from_config() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "  events: [info]\n");

    let output = run_logtap(&config, &["tap"], "warn: hidden\ninfo: shown\n");
    let stdout = stdout_of(&output);

    assert!(stdout.contains("info shown"));
    assert!(!stdout.contains("hidden"));
}

#[test]
fn test_tap_property_directives() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_logtap(
        &config,
        &["tap"],
        ":set target renamed\n:get target\n:get log\n:set nothing 1\n",
    );
    let stdout = stdout_of(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success());
    assert!(stdout.contains(r#"target = "renamed""#));
    assert!(stdout.contains("log is not a property"));
    assert!(stderr.contains("nothing"));
    assert!(stdout.contains("0 event(s)"));
}

#[test]
fn test_members_json() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");

    let output = run_logtap(&config, &["members", "--format", "json"], "");
    assert!(output.status.success());

    let members: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    let events: Vec<&str> = members["events"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e.as_str())
        .collect();
    assert_eq!(events, vec!["log", "info", "warn", "error", "debug", "trace"]);

    let target = members["members"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["name"] == "target")
        .unwrap();
    assert_eq!(target["kind"], "property");
    assert_eq!(target["value"], "cli-test");
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let output = run_logtap(&dir.path().join("absent.yaml"), &["members"], "");
    assert!(!output.status.success());
}
