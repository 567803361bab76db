//! Config command implementation.
//!
//! Generates a sample configuration file in various formats.

use kube_resource_exporter::{MetricDefinition, MetricProperties};
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = sample_config();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from(match format {
            ConfigFormat::Yaml => "kube-resource-exporter.yaml",
            ConfigFormat::Json => "kube-resource-exporter.json",
            ConfigFormat::Toml => "kube-resource-exporter.toml",
        }),
    };

    let mut content = render_config(&config, format)?;
    if commented && format == ConfigFormat::Yaml {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Defaults plus two example metrics.
pub fn sample_config() -> Config {
    Config {
        metrics: vec![
            MetricDefinition {
                name: "backup_size_bytes".into(),
                help: "Size of the last completed backup".into(),
                metric_type: "gauge".into(),
                properties: MetricProperties {
                    source: "kubernetes".into(),
                    object: "Backup".into(),
                    value: "$.status.size".into(),
                    unit: Some("MiB".into()),
                    labels: [
                        ("name".to_string(), "$.metadata.name".to_string()),
                        ("namespace".to_string(), "$.metadata.namespace".to_string()),
                    ]
                    .into(),
                    ..Default::default()
                },
            },
            MetricDefinition {
                name: "pod_label_info".into(),
                help: "One series per label key of running pods".into(),
                metric_type: "gauge".into(),
                properties: MetricProperties {
                    source: "kubernetes".into(),
                    object: "po".into(),
                    value: "1".into(),
                    field_selector: Some("status.phase=Running".into()),
                    labels: [
                        ("pod".to_string(), "$.metadata.name".to_string()),
                        ("label".to_string(), "key($.metadata.labels)".to_string()),
                    ]
                    .into(),
                    ..Default::default()
                },
            },
        ],
        ..Default::default()
    }
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Kube Resource Exporter Configuration
# ====================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                  # Bind IP (0.0.0.0 = all interfaces)
# port: 9805                       # HTTP port
# refresh_interval_seconds: 25     # Minimum seconds between two refreshes
#
# Feature Flags
# -------------
# enable_health: true              # Enable /health endpoint
# enable_telemetry: true           # Enable kube_resource_exporter_* metrics
#
# Logging
# -------
# log_level: "info"                # off, error, warn, info, debug, trace
#
# Kubernetes Access
# -----------------
# api_server: null                 # null = from kubeconfig or in-cluster
# kubeconfig: null                 # null = $KUBECONFIG, in-cluster, ~/.kube/config
# context: null                    # null = current-context
# token_file: null                 # overrides the kubeconfig / service account token
# ca_file: null                    # overrides the kubeconfig / service account CA
# insecure_skip_tls_verify: false
# request_timeout_seconds: 10
# test_data_file: null             # Serve resources from a YAML/JSON snapshot
#
# TLS/SSL Configuration
# ---------------------
# enable_tls: false                # Enable HTTPS (default: false)
# tls_cert_path: null              # Path to TLS certificate (PEM format)
# tls_key_path: null               # Path to TLS private key (PEM format)
#
# Health Thresholds (percent of the last refresh)
# -----------------------------------------------
# health.fetch_failures:   warn above warn_percent, critical above critical_percent
# health.unresolved_kinds: same, for kind names that did not resolve
#
# Metrics
# -------
# name:        Prometheus metric name
# help:        Help text (generated when empty)
# type:        counter | gauge | untyped
# properties:
#   object:        Kind, plural or short name (Backup, backups, po)
#   value:         $.path, a constant, key($.map) or val($.map)
#   unit:          count (default), ms, microsec, Mb, MiB, bytes
#   namespace:     Only list resources of this namespace
#   fieldSelector: e.g. status.phase=Running
#   labelSelector: e.g. app=web,tier in (front,back)
#   labels:        label name -> path expression; at most one key()/val() per metric
"#;

    format!("{comments}\n{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, validate_effective_config};
    use std::path::Path;

    #[test]
    fn test_sample_config_is_valid() {
        assert!(validate_effective_config(&sample_config()).is_ok());
    }

    #[test]
    fn test_commented_yaml_parses_back() {
        let text = add_config_comments(render_config(&sample_config(), ConfigFormat::Yaml).unwrap());
        let parsed = parse_config(Path::new("sample.yaml"), &text).unwrap();
        assert_eq!(parsed.metrics, sample_config().metrics);
    }

    #[test]
    fn test_writes_requested_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.toml");
        command_config(Some(path.clone()), ConfigFormat::Toml, true).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let parsed = parse_config(&path, &text).unwrap();
        assert_eq!(parsed.metrics.len(), 2);
    }
}
