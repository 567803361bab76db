//! Builds the metric registry and the resource store from configuration.

use kube_resource_exporter::{
    ConnectOptions, FetchError, KubeApiStore, KubeClientConfig, MetricRegistry, ResourceStore,
    StaticStore,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;

/// Compiles the configured metrics. Invalid definitions are logged and left out.
pub fn build_registry(config: &Config) -> MetricRegistry {
    let (registry, errors) = MetricRegistry::from_definitions(&config.metrics);
    for e in &errors {
        warn!("Skipping metric: {}", e);
    }
    info!(
        "Registered {} of {} metric definitions",
        registry.len(),
        config.metrics.len()
    );
    registry
}

/// Opens the offline snapshot when `test_data_file` is set, the API server otherwise.
pub fn build_store(config: &Config) -> Result<Arc<dyn ResourceStore>, FetchError> {
    if let Some(path) = &config.test_data_file {
        info!("Serving resources from snapshot: {}", path.display());
        return Ok(Arc::new(StaticStore::from_file(path)?));
    }

    let client = KubeClientConfig::load(&ConnectOptions {
        api_server: config.api_server.as_deref(),
        kubeconfig: config.kubeconfig.as_deref(),
        context: config.context.as_deref(),
        token_file: config.token_file.as_deref(),
        ca_file: config.ca_file.as_deref(),
        insecure_skip_tls_verify: config.insecure_skip_tls_verify.unwrap_or(false),
        timeout: config.request_timeout(),
    })?;
    if client.insecure_skip_tls_verify {
        warn!("⚠️  API server certificate verification is disabled");
    }
    let store = KubeApiStore::new(client)?;
    info!("Listing resources from API server: {}", store.api_server());
    Ok(Arc::new(store))
}
