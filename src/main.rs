//! kube-resource-exporter
//!
//! Prometheus exporter for fields of Kubernetes resources with tracing logging.
//! This is the main entry point that initializes the server and handles subcommands.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod source;
mod startup_checks;
mod state;

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use kube_resource_exporter::{HealthState, Refresher, ResourceCollector, SharedCollector};
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::{net::TcpListener, signal};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

use cli::{Args, Commands, LogFormat};
use commands::{command_check, command_config, command_kinds, command_test};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_LOG_LEVEL, DEFAULT_PORT,
};
use handlers::{config_handler, health_handler, metrics_handler, root_handler};
use metrics::ExporterMetrics;
use source::{build_registry, build_store};
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config, args: &Args) {
    let level = config.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL);
    let max_level = level
        .to_ascii_lowercase()
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    let builder = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    let installed = match args.log_format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
    };
    if let Err(e) = installed {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {}", max_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Main application entry point.
///
/// Setup runs before the async runtime exists: the API client is blocking and
/// must be created and dropped outside of it.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config.effective(), args.config_format);
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), *format, *commented),
            // `check` reports configuration problems itself
            Commands::Check { offline } => {
                let config = resolve_config(&args)?;
                setup_logging(&config, &args);
                command_check(*offline, &config)
            }
            Commands::Test {
                iterations,
                verbose,
                metric,
            } => {
                let config = load_validated_config(&args)?;
                setup_logging(&config, &args);
                command_test(*iterations, *verbose, metric.as_deref(), &config)
            }
            Commands::Kinds { filter } => {
                let config = load_validated_config(&args)?;
                setup_logging(&config, &args);
                command_kinds(filter.as_deref(), &config)
            }
        };
    }

    // Load configuration for main server mode
    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    info!("Starting kube-resource-exporter v{}", env!("CARGO_PKG_VERSION"));

    let metric_registry = Arc::new(build_registry(&config));
    let store = build_store(&config).map_err(|e| {
        error!("❌ Cannot open resource source: {}", e);
        e
    })?;

    if let Err(e) = startup_checks::validate_source(store.as_ref(), &metric_registry) {
        error!("❌ Startup validation failed: {}", e);
        error!("   The exporter will start and retry discovery on every refresh");
    }

    let health_state = Arc::new(HealthState::new(config.health.clone()));
    let collector = Arc::new(
        ResourceCollector::new(
            metric_registry.clone(),
            Refresher::new(store),
            config.refresh_interval(),
        )?
        .with_health(health_state.clone()),
    );

    let registry = Registry::new();
    registry.register(Box::new(SharedCollector(collector.clone())))?;

    let telemetry = if config.enable_telemetry.unwrap_or(true) {
        Some(ExporterMetrics::new(metric_registry.len())?)
    } else {
        None
    };

    let state = Arc::new(AppState {
        registry,
        collector,
        telemetry,
        health_state,
        config: Arc::new(config),
        start_time: Instant::now(),
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(state.clone()));
    drop(runtime);
    // Last reference: the blocking API client shuts down outside the runtime.
    drop(state);

    info!("kube-resource-exporter stopped gracefully");
    result
}

/// Resolves once SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

/// Serves the HTTP endpoints until a shutdown signal arrives.
async fn serve(state: SharedState) -> Result<(), Box<dyn std::error::Error>> {
    let config = state.config.clone();
    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }

    let app = app
        .route("/config", get(config_handler))
        .with_state(state);

    if config.enable_tls.unwrap_or(false) {
        let (Some(cert_path), Some(key_path)) =
            (config.tls_cert_path.as_ref(), config.tls_key_path.as_ref())
        else {
            return Err("TLS is enabled but tls_cert_path or tls_key_path is not set".into());
        };

        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "kube-resource-exporter listening on https://{}:{}",
            bind_ip_str, port
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "kube-resource-exporter listening on http://{}:{}",
            bind_ip_str, port
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    }

    Ok(())
}
