//! CLI integration tests for chat-migrate.
//!
//! These tests verify argument parsing, help output, and exit codes for
//! failures that happen before any store is contacted.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the chat-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("chat-migrate").unwrap()
}

/// A config file with only the source section filled in.
fn minimal_config() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  uri: mongodb://127.0.0.1:1").unwrap();
    writeln!(file, "  database: chat").unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--pipeline"))
        .stdout(predicate::str::contains("--batch-size"))
        .stdout(predicate::str::contains("--verify"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_run_lists_pipeline_values() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("conversations"))
        .stdout(predicate::str::contains("messages"))
        .stdout(predicate::str::contains("[default: all]"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_file_fails() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_fields_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  uri: \"\"").unwrap();
    writeln!(file, "  database: chat").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source.uri"));
}

#[test]
fn test_unknown_ssl_mode_exits_with_code_2() {
    let mut file = minimal_config();
    writeln!(file, "postgres:").unwrap();
    writeln!(file, "  host: localhost").unwrap();
    writeln!(file, "  database: chat").unwrap();
    writeln!(file, "  user: chat").unwrap();
    writeln!(file, "  ssl_mode: sometimes").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2);
}

#[test]
fn test_zero_batch_size_override_exits_with_code_2() {
    let file = minimal_config();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--batch-size",
            "0",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("batch_size"));
}

#[test]
fn test_invalid_verbosity_exits_with_code_2() {
    let file = minimal_config();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--verbosity",
            "chatty",
            "health-check",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_unknown_pipeline_is_rejected() {
    cmd()
        .args(["run", "--pipeline", "attachments"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("attachments"));
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
