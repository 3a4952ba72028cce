//! Integration tests for the `snooze` CLI binary
//!
//! Run with: cargo test --test cli

#![cfg(unix)]

mod helpers;

use helpers::daemon_guard::{start_daemon, DaemonEnv};
use serde_json::{json, Value};
use std::fs;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn setup() -> (TempDir, DaemonEnv) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let env = DaemonEnv::new(temp_dir.path());
    fs::create_dir_all(&env.daemon_dir).unwrap();
    fs::write(
        &env.settings_file,
        json!({"editor.fontSize": 14, "snoozeSetting.defaultDuration": 10}).to_string(),
    )
    .unwrap();
    (temp_dir, env)
}

fn snooze(env: &DaemonEnv, args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_snooze"));
    env.apply(&mut command);
    command
        .env("SNOOZE_DAEMON_BIN", env!("CARGO_BIN_EXE_snoozed"))
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("Failed to run snooze")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_set_then_list_and_clear() {
    let (_temp_dir, env) = setup();
    let _daemon = start_daemon(&env).expect("daemon should start");

    let output = snooze(&env, &["set", "editor.fontSize", "18", "--minutes", "5"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Snoozed \"editor.fontSize\" for 5 minutes (expires at "));

    let output = snooze(&env, &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("• editor.fontSize: 18 (5 min left)"));

    let output = snooze(&env, &["list", "--json"]);
    let entries: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(entries[0]["key"], json!("editor.fontSize"));

    let output = snooze(&env, &["clear", "--yes"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("All snoozed settings have been cleared"));

    let settings: Value =
        serde_json::from_str(&fs::read_to_string(&env.settings_file).unwrap()).unwrap();
    assert_eq!(settings["editor.fontSize"], json!(14));
}

#[test]
fn test_clear_with_nothing_snoozed_does_not_prompt() {
    let (_temp_dir, env) = setup();
    let _daemon = start_daemon(&env).expect("daemon should start");

    let output = snooze(&env, &["clear"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("No settings are currently snoozed"));
}

#[test]
fn test_set_rejects_bad_input_without_a_daemon() {
    let (_temp_dir, env) = setup();

    let output = snooze(&env, &["set", "missing.key", "1", "-m", "5"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Setting \"missing.key\" not found"));

    let output = snooze(&env, &["set", "editor.fontSize", "18", "-m", "soon"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid duration"));

    let output = snooze(&env, &["set", "editor.fontSize", "{", "-m", "5"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Invalid JSON value"));

    // Validation happens before the daemon would be started
    assert!(!env.socket_path().exists());
}

#[test]
fn test_duration_prompt_offers_configured_default() {
    let (_temp_dir, env) = setup();
    let _daemon = start_daemon(&env).expect("daemon should start");

    let mut command = Command::new(env!("CARGO_BIN_EXE_snooze"));
    env.apply(&mut command);
    let output = command
        .args(["set", "editor.fontSize", "16"])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    // EOF on the duration prompt cancels the command
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("(default: 10)"));
    assert!(!stdout(&output).contains("Snoozed \""));
}

#[test]
fn test_command_auto_starts_daemon() {
    let (_temp_dir, env) = setup();

    let output = snooze(&env, &["test"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("Test command executed"));
    assert!(env.socket_path().exists());

    let output = snooze(&env, &["daemon-stop"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Daemon stopping"));
}
