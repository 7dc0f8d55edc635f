//! Integration tests for configuration validation through the binary.
//!
//! These tests run `--check-config` and `config` against the built binary.

use std::io::Write;
use tempfile::NamedTempFile;

/// Helper to get the binary path
fn binary_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_lightsocks-monitor"))
}

fn run(args: &[&str]) -> (bool, String) {
    let output = std::process::Command::new(binary_path())
        .args(args)
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    (output.status.success(), format!("{stdout}{stderr}"))
}

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_defaults_are_valid() {
    let (ok, output) = run(&["--no-config", "--check-config"]);
    assert!(ok, "Expected defaults to validate, got: '{}'", output);
    assert!(output.contains("Configuration is valid"));
}

#[test]
fn test_port_zero_is_rejected() {
    let (ok, output) = run(&["--no-config", "--port", "0", "--check-config"]);
    assert!(!ok);
    assert!(
        output.contains("port must be between 1 and 65535"),
        "Expected port error, got: '{}'",
        output
    );
}

#[test]
fn test_zero_render_interval_is_rejected() {
    let (ok, output) = run(&["--no-config", "--render-interval", "0", "--check-config"]);
    assert!(!ok);
    assert!(output.contains("render_interval_ms"), "got: '{}'", output);
}

#[test]
fn test_inverted_retry_bounds_in_yaml() {
    let file = config_file(
        ".yaml",
        "stream:\n  min_retry_interval_ms: 60000\n  max_retry_interval_ms: 1000\n",
    );
    let path = file.path().to_str().unwrap();

    let (ok, output) = run(&["--config", path, "--check-config"]);
    assert!(!ok);
    assert!(output.contains("min_retry_interval_ms"), "got: '{}'", output);
}

#[test]
fn test_json_config_is_loaded() {
    let file = config_file(".json", r#"{"host": "proxy.lan", "port": 7070}"#);
    let path = file.path().to_str().unwrap();

    let (ok, output) = run(&["--config", path, "--show-config", "--config-format", "json"]);
    assert!(ok, "got: '{}'", output);
    assert!(output.contains("proxy.lan"));
    assert!(output.contains("7070"));
}

#[test]
fn test_cli_overrides_config_file() {
    let file = config_file(".yaml", "host: from-file\nport: 7070\n");
    let path = file.path().to_str().unwrap();

    let (ok, output) = run(&["--config", path, "--port", "8080", "--show-config"]);
    assert!(ok, "got: '{}'", output);
    assert!(output.contains("from-file"));
    assert!(output.contains("8080"));
    assert!(!output.contains("7070"));
}

#[test]
fn test_show_config_redacts_secret() {
    let (ok, output) = run(&["--no-config", "--secret", "hunter2", "--show-config"]);
    assert!(ok, "got: '{}'", output);
    assert!(!output.contains("hunter2"));
}

#[test]
fn test_missing_config_file_is_rejected() {
    let (ok, output) = run(&["--config", "/nonexistent/monitor.yaml", "--check-config"]);
    assert!(!ok);
    assert!(output.contains("Config file not found"), "got: '{}'", output);
}

#[test]
fn test_config_command_writes_to_stdout() {
    let (ok, output) = run(&["--no-config", "config", "--output", "-"]);
    assert!(ok, "got: '{}'", output);
    assert!(output.contains("buffer_length: 200"));
    assert!(output.contains("port: 9090"));
}
