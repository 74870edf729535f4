//! Integration tests for the `deskflow` CLI binary.
//!
//! Argument parsing, help output, completions, and the data commands run
//! against the built-in mock source, so no backend is needed.
#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `deskflow` binary with env isolation.
///
/// Clears all `DESKFLOW_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn deskflow_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("deskflow");
    cmd.env("HOME", "/tmp/deskflow-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/deskflow-cli-test-nonexistent")
        .env_remove("DESKFLOW_PROFILE")
        .env_remove("DESKFLOW_URL")
        .env_remove("DESKFLOW_API_KEY")
        .env_remove("DESKFLOW_OUTPUT")
        .env_remove("DESKFLOW_INSECURE")
        .env_remove("DESKFLOW_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = deskflow_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    deskflow_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("list")
            .and(predicate::str::contains("route"))
            .and(predicate::str::contains("ticket"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    deskflow_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("deskflow"));
}

#[test]
fn test_completions_zsh() {
    deskflow_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Mock-backed data commands ───────────────────────────────────────

#[test]
fn test_list_clients_table() {
    deskflow_cmd()
        .args(["--mock", "list", "clients"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Name").and(predicate::str::contains("c-1")));
}

#[test]
fn test_list_tickets_plain_filters_by_assignee() {
    let output = deskflow_cmd()
        .args([
            "--mock",
            "--output",
            "plain",
            "list",
            "tickets",
            "--assigned-to",
            "tech-1",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<_> = stdout.lines().collect();
    assert_eq!(ids, vec!["t-1", "t-4"]);
}

#[test]
fn test_list_json_is_parseable() {
    let output = deskflow_cmd()
        .args(["--mock", "-o", "json-compact", "list", "categories"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 3);
}

#[test]
fn test_route_reports_prefetched_collections() {
    deskflow_cmd()
        .args(["--mock", "-o", "plain", "route", "/tickets/t-1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("tickets")
                .and(predicate::str::contains("clients"))
                .and(predicate::str::contains("technicians")),
        );
}

#[test]
fn test_route_without_collections_prints_nothing() {
    deskflow_cmd()
        .args(["--mock", "route", "/settings"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No collections"));

    deskflow_cmd()
        .args(["--mock", "--quiet", "route", "/settings"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No collections").not());
}

#[test]
fn test_ticket_status_prints_updated_ticket() {
    deskflow_cmd()
        .args(["--mock", "ticket", "status", "t-3", "resolved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("resolved"));
}

#[test]
fn test_unknown_ticket_is_not_found() {
    let output = deskflow_cmd()
        .args(["--mock", "ticket", "assign", "t-404", "tech-1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("not found"));
}

#[test]
fn test_client_rename_rejects_blank_name() {
    let output = deskflow_cmd()
        .args(["--mock", "client", "rename", "c-1", "  "])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_watch_runs_for_duration() {
    deskflow_cmd()
        .args(["--mock", "watch", "--user", "tech-1", "--for", "1s"])
        .assert()
        .success()
        .stderr(predicate::str::contains("connected"));
}

#[test]
fn test_watch_requires_user() {
    deskflow_cmd()
        .args(["--mock", "watch", "--for", "1s"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("user"));
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    // `config show` falls back to defaults when no file exists.
    deskflow_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_path_points_into_config_dir() {
    deskflow_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_missing_profile_is_reported() {
    let output = deskflow_cmd()
        .args(["--profile", "nowhere", "list", "clients"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("nowhere"));
}

#[test]
fn test_url_without_key_needs_credentials() {
    let output = deskflow_cmd()
        .args(["--url", "https://desk.example.co", "list", "clients"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_invalid_output_format() {
    let output = deskflow_cmd()
        .args(["--output", "invalid", "--mock", "list", "clients"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_config_init_writes_default_profile() {
    let dir = tempfile::tempdir().unwrap();
    let config_home = dir.path().to_str().unwrap();

    deskflow_cmd()
        .env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .args([
            "config",
            "init",
            "--url",
            "https://desk.example.co",
            "--user-id",
            "tech-1",
        ])
        .assert()
        .success();

    deskflow_cmd()
        .env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default *"));
}

#[test]
fn test_config_init_rejects_non_http_url() {
    let dir = tempfile::tempdir().unwrap();
    let config_home = dir.path().to_str().unwrap();

    deskflow_cmd()
        .env("HOME", config_home)
        .env("XDG_CONFIG_HOME", config_home)
        .args(["config", "init", "--url", "ftp://desk.example.co"])
        .assert()
        .failure();
}
