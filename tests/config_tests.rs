//! Integration tests for configuration files and CLI overrides.
//!
//! These tests run the binary against temporary configuration files.

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

fn binary_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_kube-resource-exporter"))
}

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp config file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file.flush().expect("Failed to flush config file");
    file
}

fn run_with(file: &NamedTempFile, args: &[&str]) -> Output {
    Command::new(binary_path())
        .arg("-c")
        .arg(file.path())
        .args(args)
        .output()
        .expect("Failed to execute command")
}

const VALID_YAML: &str = r#"
port: 9900
metrics:
  - name: backup_size_bytes
    help: Size of the last backup
    type: gauge
    properties:
      object: Backup
      value: $.status.size
      unit: MiB
      labels:
        name: $.metadata.name
"#;

#[test]
fn test_valid_yaml_config() {
    let file = config_file(".yaml", VALID_YAML);
    let output = run_with(&file, &["--check-config"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("Configuration is valid"));
}

#[test]
fn test_invalid_metrics_are_listed() {
    let file = config_file(
        ".yaml",
        r#"
metrics:
  - name: ok_metric
    properties: {object: Pod, value: "1"}
  - name: ok_metric
    properties: {object: Pod, value: "1"}
  - name: two_enumerations
    properties:
      object: Pod
      value: val($.status.counts)
      labels:
        key: key($.metadata.labels)
  - name: bad_selector
    properties:
      object: Pod
      value: "1"
      labelSelector: "app in (web"
"#,
    );
    let output = run_with(&file, &["--check-config"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("3 invalid metric definition(s)"), "stderr: {stderr}");
    assert!(stderr.contains("declared more than once"), "stderr: {stderr}");
    assert!(stderr.contains("at most one key(...)/val(...)"), "stderr: {stderr}");
    assert!(stderr.contains("bad_selector"), "stderr: {stderr}");
}

#[test]
fn test_zero_refresh_interval_rejected() {
    let file = config_file(".yaml", VALID_YAML);
    let output = run_with(&file, &["--refresh-interval", "0", "--check-config"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("refresh_interval_seconds must be greater than 0"));
}

#[test]
fn test_cli_overrides_file_in_show_config() {
    let file = config_file(".yaml", VALID_YAML);
    let output = run_with(
        &file,
        &["--port", "9999", "--show-config", "--config-format", "json"],
    );
    assert!(output.status.success());

    let shown: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("show-config prints JSON");
    assert_eq!(shown["port"], 9999);
    assert_eq!(shown["refresh_interval_seconds"], 25);
    assert_eq!(shown["metrics"][0]["name"], "backup_size_bytes");
    assert_eq!(shown["metrics"][0]["properties"]["type"], "kubernetes");
}

#[test]
fn test_json_config_file() {
    let file = config_file(
        ".json",
        r#"{"enable_health": false, "metrics": [{"name": "pods", "type": "gauge", "properties": {"object": "po", "value": "1"}}]}"#,
    );
    let output = run_with(&file, &["--check-config"]);
    assert!(output.status.success());
}

#[test]
fn test_missing_config_file_fails() {
    let output = Command::new(binary_path())
        .args(["-c", "/nonexistent/kube-resource-exporter.yaml", "--check-config"])
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());
}

#[test]
fn test_offline_check_subcommand() {
    let file = config_file(".yaml", VALID_YAML);
    let output = run_with(&file, &["check", "--offline"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("1 metric definitions compile"));
}

#[test]
fn test_subcommand_against_snapshot() {
    let snapshot = config_file(
        ".yaml",
        r#"
catalog:
  - {group: backup.example.io, version: v1, kind: Backup, shortNames: [bk]}
resources:
  Backup:
    - apiVersion: backup.example.io/v1
      kind: Backup
      metadata: {name: nightly, namespace: ops}
      status: {size: 2}
"#,
    );
    let file = config_file(".yaml", VALID_YAML);
    let snapshot_path = snapshot.path().to_str().unwrap();

    let output = run_with(&file, &["-t", snapshot_path, "test", "--verbose"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(
        stdout.contains(r#"backup_size_bytes{name="nightly"} 2097152"#),
        "stdout: {stdout}"
    );

    let output = run_with(&file, &["-t", snapshot_path, "kinds", "--filter", "bk"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("backup.example.io/v1"), "stdout: {stdout}");

    let output = run_with(&file, &["-t", snapshot_path, "check"]);
    assert!(output.status.success());
}

#[test]
fn test_config_subcommand_prints_commented_sample() {
    let output = Command::new(binary_path())
        .args(["config", "-o", "-", "--commented"])
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("metrics:"));
    assert!(stdout.contains("kubeconfig"));
}
