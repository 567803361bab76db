//! CLI arguments and subcommands for kube-resource-exporter.
//!
//! Flags override the values of the configuration file, which override the
//! built-in defaults.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "kube-resource-exporter",
    about = "Prometheus exporter for fields of Kubernetes resources",
    long_about = "Prometheus exporter for fields of Kubernetes resources.\n\n\
                  Declare per metric a resource kind, a path expression for the value, a unit \
                  and label path expressions. Every scrape lists the resources (at most once \
                  per refresh interval) and exposes one sample per matching resource.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Log line format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Minimum seconds between two refreshes of the resource lists
    #[arg(long)]
    pub refresh_interval: Option<u64>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,

    /// Disable internal kube_resource_exporter_* metrics
    #[arg(long)]
    pub disable_telemetry: bool,

    /// Serve resources from a JSON/YAML snapshot instead of the API server
    #[arg(short = 't', long)]
    pub test_data_file: Option<PathBuf>,

    /// Kubernetes API server URL (skips kubeconfig lookup when set)
    #[arg(long)]
    pub api_server: Option<String>,

    /// Kubeconfig file (default: $KUBECONFIG, in-cluster, then ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of current-context
    #[arg(long)]
    pub context: Option<String>,

    /// Bearer token file (default: service account token)
    #[arg(long)]
    pub token_file: Option<PathBuf>,

    /// CA bundle for the API server certificate (PEM)
    #[arg(long)]
    pub ca_file: Option<PathBuf>,

    /// Skip verification of the API server certificate
    #[arg(long)]
    pub insecure_skip_tls_verify: bool,

    /// Timeout in seconds for a single API request
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and reachability of the resource source
    Check {
        /// Only validate the configuration, do not contact the API server
        #[arg(long)]
        offline: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run refresh cycles and print the resulting samples
    Test {
        /// Number of test iterations
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every sample, not only per-metric counts
        #[arg(long)]
        verbose: bool,

        /// Only evaluate metrics whose name contains this string
        #[arg(short = 'm', long)]
        metric: Option<String>,
    },

    /// List the resource kinds the source serves and their aliases
    Kinds {
        /// Only show kinds whose name or alias contains this string
        #[arg(short = 'f', long)]
        filter: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["kube-resource-exporter"]);
        assert!(args.command.is_none());
        assert!(args.log_level.is_none());
        assert_eq!(args.log_format, LogFormat::Text);
        assert_eq!(args.config_format, ConfigFormat::Yaml);
        assert!(!args.insecure_skip_tls_verify);
    }

    #[test]
    fn test_overrides_and_subcommand() {
        let args = Args::parse_from([
            "kube-resource-exporter",
            "--port",
            "9900",
            "--refresh-interval",
            "60",
            "--log-level",
            "debug",
            "test",
            "-n",
            "3",
            "--metric",
            "backup",
        ]);
        assert_eq!(args.port, Some(9900));
        assert_eq!(args.refresh_interval, Some(60));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
        match args.command {
            Some(Commands::Test {
                iterations, metric, ..
            }) => {
                assert_eq!(iterations, 3);
                assert_eq!(metric.as_deref(), Some("backup"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
