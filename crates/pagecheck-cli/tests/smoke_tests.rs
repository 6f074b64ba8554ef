//! Smoke tests for the pagecheck CLI
//!
//! These run the built binary and never need a browser.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the pagecheck binary
fn pagecheck() -> Command {
    let mut cmd = Command::cargo_bin("pagecheck").expect("pagecheck binary should exist");
    cmd.env_remove("PAGECHECK_BASE_URL").env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    pagecheck()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3.0"));
}

#[test]
fn test_help_flag() {
    pagecheck()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("fingerprint"));
}

#[test]
fn test_no_args_fails() {
    pagecheck().assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    pagecheck()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--base-url"))
        .stdout(predicate::str::contains("--parallel"));
}

// ============================================================================
// List / Fingerprint / Config
// ============================================================================

#[test]
fn test_list_shows_builtin_suites() {
    pagecheck()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("st_json"))
        .stdout(predicate::str::contains("displays collapsed json"))
        .stdout(predicate::str::contains("sets the page favicon with ico file"));
}

#[test]
fn test_fingerprint_of_empty_file() {
    let dir = TempDir::new().unwrap();
    let icon = dir.path().join("favicon.png");
    fs::write(&icon, b"").unwrap();

    pagecheck()
        .arg("fingerprint")
        .arg(&icon)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "d14a028c2a3a2bc9476102bb288234c415a2b01f828ea62ac5b3e42f.png",
        ));
}

#[test]
fn test_fingerprint_missing_file_fails() {
    pagecheck()
        .args(["fingerprint", "/no/such/icon.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_config_prints_effective_yaml() {
    pagecheck()
        .args(["config", "--base-url", "http://localhost:8501/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("base_url:"))
        .stdout(predicate::str::contains("http://localhost:8501/"))
        .stdout(predicate::str::contains("preflight: true"));
}

#[test]
fn test_config_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pagecheck.yaml");
    fs::write(&path, "base_url: http://from-file:9000/\npreflight: false\n").unwrap();

    pagecheck()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("http://from-file:9000/"))
        .stdout(predicate::str::contains("preflight: false"));
}

#[test]
fn test_env_base_url_is_applied() {
    pagecheck()
        .env("PAGECHECK_BASE_URL", "http://from-env:1234/")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("http://from-env:1234/"));
}

// ============================================================================
// Run: failures that happen before any browser starts
// ============================================================================

#[test]
fn test_run_rejects_non_http_base_url() {
    pagecheck()
        .args(["run", "--base-url", "not-a-url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_run_rejects_unknown_suite() {
    pagecheck()
        .args(["run", "--suite", "st_missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown suite"));
}
