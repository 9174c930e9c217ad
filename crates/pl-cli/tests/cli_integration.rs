//! CLI integration tests
//!
//! Tests the panelink CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::net::TcpListener;
use std::path::Path;

fn panelink() -> Command {
    Command::cargo_bin("panelink")
        .expect("Failed to locate panelink binary - ensure it's built before running tests")
}

/// A local port with nothing listening on it
fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Points every transport at a closed local port
fn write_config(path: &Path) {
    let content = format!(
        "[device]\naddress = \"127.0.0.1\"\nsocket_port = {}\nshell_port = {}\nframebuffer_port = {}\nsocket_timeout = 1\nshell_timeout = 1\nframebuffer_timeout = 1\n\n[coordinator.watchdog]\nenabled = false\n",
        closed_port(),
        closed_port(),
        closed_port()
    );
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_cli_help() {
    panelink()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("panelink"))
        .stdout(predicate::str::contains("Printer front-panel connection tool"));
}

#[test]
fn test_cli_version() {
    panelink()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("panelink"));
}

#[test]
fn test_cli_capture_help() {
    panelink()
        .args(["capture", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--address"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_cli_input_help() {
    panelink()
        .args(["input", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tap"))
        .stdout(predicate::str::contains("drag"))
        .stdout(predicate::str::contains("scroll"));
}

#[test]
fn test_cli_input_rejects_bad_view_size() {
    panelink()
        .args(["input", "--address", "127.0.0.1", "tap", "1", "2", "--view", "400"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected AxB"));
}

#[test]
fn test_cli_input_reports_refused_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path);

    panelink()
        .args(["input", "--config"])
        .arg(&path)
        .args(["scroll", "down", "--steps", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("socket did not connect"));
}

#[test]
fn test_cli_exec_requires_command() {
    panelink().arg("exec").assert().failure();
}

#[test]
fn test_cli_unknown_command() {
    panelink()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panelink.toml");

    panelink()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("panelink.toml"));
}

#[test]
fn test_cli_config_init_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    panelink()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    panelink()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[device]"))
        .stdout(predicate::str::contains("framebuffer_port = 5900"));

    panelink()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_cli_config_show_missing() {
    let dir = tempfile::tempdir().unwrap();
    panelink()
        .args(["config", "show", "--config"])
        .arg(dir.path().join("missing.toml"))
        .assert()
        .success()
        .stderr(predicate::str::contains("No configuration file"));
}

#[test]
fn test_cli_capture_without_address() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    panelink()
        .args(["capture", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no device address"));
}

#[test]
fn test_cli_missing_explicit_config() {
    let dir = tempfile::tempdir().unwrap();
    panelink()
        .args(["status", "--address", "127.0.0.1", "--config"])
        .arg(dir.path().join("missing.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load"));
}

#[test]
fn test_cli_exec_reports_refused_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path);

    panelink()
        .args(["exec", "--config"])
        .arg(&path)
        .arg("uptime")
        .assert()
        .failure()
        .stderr(predicate::str::contains("socket did not connect"))
        .stderr(predicate::str::contains("connection failed"));
}

#[test]
fn test_cli_status_json_when_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    write_config(&path);

    panelink()
        .args(["status", "--json", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""socket": false"#));
}
