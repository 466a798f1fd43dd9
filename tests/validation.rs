//! Configuration validation tests
//!
//! Bad flags and bad environment values must be rejected before any tunnel
//! is started.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use assert_cmd::Command;
use tempfile::TempDir;

const CONFIG_VARS: &[&str] = &[
    "TUNNEL_LOG_DIR",
    "AUTO_TEST_DURATION",
    "AUTO_TEST_INTERVAL",
    "AUTO_TEST_TUNNEL_ID",
    "PROBE_DIRECTIVE",
    "READ_TIMEOUT_MS",
    "TEST_DOUBLE_CMD",
    "STARTUP_DELAY_MS",
    "TUNNEL_LAUNCHERS",
    "ENABLE_COLOR",
];

fn create_test_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tunnel-manager").unwrap();
    cmd.current_dir(dir.path());
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_conflicting_color_flags() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--color", "--no-color"])
        .write_stdin("halt\n")
        .assert()
        .failure();
}

#[test]
fn test_auto_only_flags_require_auto_test() {
    let dir = TempDir::new().unwrap();
    for args in [
        vec!["--duration", "5"],
        vec!["--interval", "0.5"],
        vec!["--tunnel-id", "2"],
        vec!["--directive", "ping"],
    ] {
        create_test_cmd(&dir)
            .args(&args)
            .write_stdin("halt\n")
            .assert()
            .code(1)
            .stderr(predicate::str::contains("requires --auto-test"));
    }
}

#[test]
fn test_rejected_flag_values() {
    let dir = TempDir::new().unwrap();
    for args in [
        vec!["--auto-test", "--duration", "0"],
        vec!["--auto-test", "--duration", "-3"],
        vec!["--auto-test", "--interval", "-0.1"],
        vec!["--auto-test", "--tunnel-id", "0"],
        vec!["--read-timeout-ms", "0"],
    ] {
        create_test_cmd(&dir).args(&args).assert().failure();
    }
}

#[test]
fn test_malformed_environment_value() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .env("AUTO_TEST_DURATION", "a minute")
        .arg("--no-color")
        .write_stdin("halt\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("AUTO_TEST_DURATION"));
}

#[test]
fn test_malformed_env_file_value() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "READ_TIMEOUT_MS=soon\n").unwrap();

    create_test_cmd(&dir)
        .arg("--no-color")
        .write_stdin("halt\n")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("READ_TIMEOUT_MS"));
}

#[test]
fn test_log_dir_that_is_a_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("not_a_dir"), "x").unwrap();

    create_test_cmd(&dir)
        .args(["--no-color", "--auto-test", "--duration", "0.2", "--log-dir", "not_a_dir"])
        .args(["--test-double", "cat"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not_a_dir"));
}

#[test]
fn test_cli_value_wins_over_environment() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .env("READ_TIMEOUT_MS", "250")
        .args(["--no-color", "--read-timeout-ms", "500"])
        .write_stdin("halt\n")
        .assert()
        .success();
}
