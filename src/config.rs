//! Configuration management for kube-resource-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat};
use kube_resource_exporter::{ConfigError, HealthConfig, MetricDefinition, MetricRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9805;
pub const DEFAULT_REFRESH_INTERVAL: u64 = 25;
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Exporter configuration. Unset fields fall back to the `DEFAULT_*` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    /// Minimum seconds between two refreshes of the resource lists
    #[serde(alias = "refresh-interval-seconds")]
    pub refresh_interval_seconds: Option<u64>,

    // Feature flags
    pub enable_health: Option<bool>,
    pub enable_telemetry: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // Kubernetes access
    #[serde(alias = "api-server")]
    pub api_server: Option<String>,
    /// Kubeconfig file; `KUBECONFIG`, in-cluster and `~/.kube/config` are tried when unset
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context (default: `current-context`)
    pub context: Option<String>,
    #[serde(alias = "token-file")]
    pub token_file: Option<PathBuf>,
    #[serde(alias = "ca-file")]
    pub ca_file: Option<PathBuf>,
    #[serde(alias = "insecure-skip-tls-verify")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(alias = "request-timeout-seconds")]
    pub request_timeout_seconds: Option<u64>,

    /// Path to a resource snapshot (serves resources instead of the API server)
    #[serde(alias = "test-data-file")]
    pub test_data_file: Option<PathBuf>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,

    // Tables come last so the TOML serializer accepts the layout.
    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            port: Some(DEFAULT_PORT),
            refresh_interval_seconds: Some(DEFAULT_REFRESH_INTERVAL),
            enable_health: Some(true),
            enable_telemetry: Some(true),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
            api_server: None,
            kubeconfig: None,
            context: None,
            token_file: None,
            ca_file: None,
            insecure_skip_tls_verify: Some(false),
            request_timeout_seconds: Some(DEFAULT_REQUEST_TIMEOUT),
            test_data_file: None,
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
            health: HealthConfig::default(),
            metrics: Vec::new(),
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_seconds
                .unwrap_or(DEFAULT_REFRESH_INTERVAL),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        )
    }

    /// The configuration with every unset scalar replaced by its default.
    pub fn effective(&self) -> Config {
        let defaults = Config::default();
        Config {
            port: self.port.or(defaults.port),
            bind: self.bind.clone().or(defaults.bind),
            refresh_interval_seconds: self
                .refresh_interval_seconds
                .or(defaults.refresh_interval_seconds),
            enable_health: self.enable_health.or(defaults.enable_health),
            enable_telemetry: self.enable_telemetry.or(defaults.enable_telemetry),
            log_level: self.log_level.clone().or(defaults.log_level),
            insecure_skip_tls_verify: self
                .insecure_skip_tls_verify
                .or(defaults.insecure_skip_tls_verify),
            request_timeout_seconds: self
                .request_timeout_seconds
                .or(defaults.request_timeout_seconds),
            enable_tls: self.enable_tls.or(defaults.enable_tls),
            ..self.clone()
        }
    }
}

/// Compiles every metric definition and returns all problems found.
pub fn validate_metrics(metrics: &[MetricDefinition]) -> Vec<ConfigError> {
    MetricRegistry::from_definitions(metrics).1
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.refresh_interval_seconds == Some(0) {
        return Err("refresh_interval_seconds must be greater than 0".into());
    }
    if cfg.request_timeout_seconds == Some(0) {
        return Err("request_timeout_seconds must be greater than 0".into());
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}', expected one of: {}",
                level,
                LOG_LEVELS.join(", ")
            )
            .into());
        }
    }

    if let Some(server) = cfg.api_server.as_deref() {
        if !(server.starts_with("https://") || server.starts_with("http://")) {
            return Err(format!(
                "api_server '{}' must start with https:// or http://",
                server
            )
            .into());
        }
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        match (cfg.tls_cert_path.as_deref(), cfg.tls_key_path.as_deref()) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file(cert, "certificate")?;
                check_pem_file(key, "private key")?;
            }
        }
    }

    let errors = validate_metrics(&cfg.metrics);
    if !errors.is_empty() {
        let lines: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
        return Err(format!(
            "{} invalid metric definition(s):\n{}",
            errors.len(),
            lines.join("\n")
        )
        .into());
    }

    Ok(())
}

fn check_pem_file(path: &str, what: &str) -> Result<(), Box<dyn std::error::Error>> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", what, path).into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("TLS {} file not found: {}", what, path).into())
        }
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", what, path, e).into()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }
    if let Some(interval) = args.refresh_interval {
        config.refresh_interval_seconds = Some(interval);
    }

    // Feature flags
    if args.disable_health {
        config.enable_health = Some(false);
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    if let Some(test_file) = &args.test_data_file {
        config.test_data_file = Some(test_file.clone());
    }

    // Kubernetes access: CLI wins if provided
    if let Some(server) = &args.api_server {
        config.api_server = Some(server.clone());
    }
    if let Some(kubeconfig) = &args.kubeconfig {
        config.kubeconfig = Some(kubeconfig.clone());
    }
    if let Some(context) = &args.context {
        config.context = Some(context.clone());
    }
    if let Some(token_file) = &args.token_file {
        config.token_file = Some(token_file.clone());
    }
    if let Some(ca_file) = &args.ca_file {
        config.ca_file = Some(ca_file.clone());
    }
    if args.insecure_skip_tls_verify {
        config.insecure_skip_tls_verify = Some(true);
    }
    if let Some(timeout) = args.request_timeout {
        config.request_timeout_seconds = Some(timeout);
    }

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

/// Loads the configuration file, trying the default locations when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            let defaults = [
                "/etc/kube-resource-exporter/config.yaml",
                "./kube-resource-exporter.yaml",
                "./kube-resource-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(found) => PathBuf::from(found),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&path, &content)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses configuration text, choosing the format from the file extension.
pub fn parse_config(path: &Path, content: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        // Default to YAML
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    const SAMPLE: &str = r#"
port: 9900
refresh_interval_seconds: 60
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

    fn sample() -> Config {
        parse_config(Path::new("config.yaml"), SAMPLE).unwrap()
    }

    #[test]
    fn test_yaml_leaves_unset_fields_empty() {
        let config = sample();
        assert_eq!(config.port, Some(9900));
        assert_eq!(config.bind, None);
        assert_eq!(config.metrics.len(), 1);
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(DEFAULT_REQUEST_TIMEOUT));
        assert!(validate_effective_config(&config).is_ok());
    }

    #[test]
    fn test_effective_fills_defaults() {
        let config = sample().effective();
        assert_eq!(config.port, Some(9900));
        assert_eq!(config.bind.as_deref(), Some(DEFAULT_BIND_ADDR));
        assert_eq!(config.enable_health, Some(true));
        assert_eq!(config.metrics.len(), 1);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        std::io::Write::write_all(&mut file, SAMPLE.as_bytes()).unwrap();

        let args = Args::parse_from([
            "kube-resource-exporter",
            "-c",
            file.path().to_str().unwrap(),
            "--port",
            "9999",
            "--api-server",
            "https://10.0.0.1:6443",
            "--disable-health",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.refresh_interval_seconds, Some(60));
        assert_eq!(config.api_server.as_deref(), Some("https://10.0.0.1:6443"));
        assert_eq!(config.enable_health, Some(false));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(load_config(Some(Path::new("/nonexistent/config.yaml"))).is_err());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let config = Config {
            refresh_interval_seconds: Some(0),
            ..Default::default()
        };
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().contains("refresh_interval_seconds"));
    }

    #[test]
    fn test_rejects_api_server_without_scheme() {
        let config = Config {
            api_server: Some("10.0.0.1:6443".into()),
            ..Default::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_rejects_tls_without_key() {
        let config = Config {
            enable_tls: Some(true),
            tls_cert_path: Some("/tmp/cert.pem".into()),
            ..Default::default()
        };
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().contains("tls_key_path"));
    }

    #[test]
    fn test_reports_every_invalid_metric() {
        let mut config = sample();
        let mut bad = config.metrics[0].clone();
        bad.properties.value = String::new();
        config.metrics.push(bad);
        config.metrics.push(MetricDefinition {
            name: "2bad".into(),
            ..config.metrics[0].clone()
        });

        let errors = validate_metrics(&config.metrics);
        assert_eq!(errors.len(), 2);
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().starts_with("2 invalid metric definition(s)"));
    }

    #[test]
    fn test_every_format_renders() {
        let config = sample().effective();
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let text = render_config(&config, format).unwrap();
            assert!(text.contains("backup_size_bytes"), "{format:?}: {text}");
        }
    }

    #[test]
    fn test_toml_round_trips_metrics() {
        let config = sample();
        let text = render_config(&config, ConfigFormat::Toml).unwrap();
        let parsed = parse_config(Path::new("config.toml"), &text).unwrap();
        assert_eq!(parsed.metrics, config.metrics);
    }
}
