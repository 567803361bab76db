//! Startup validation of the resource source.
//!
//! Probes the catalog of the configured store and reports which configured
//! kinds it can serve before the first scrape arrives.

use kube_resource_exporter::{KindResolver, MetricRegistry, ResourceStore};
use tracing::{error, info, warn};

/// Probe the store catalog and resolve every configured kind.
///
/// Unresolvable kinds only warn: the resource definition may be installed
/// after the exporter starts.
pub fn validate_source(
    store: &dyn ResourceStore,
    registry: &MetricRegistry,
) -> Result<usize, ValidationError> {
    info!("🔍 Probing resource catalog...");

    let catalog = store.catalog().map_err(|e| {
        error!("❌ Cannot read resource catalog: {}", e);
        error!("   Check api_server, token_file and ca_file, and that the service account");
        error!("   may list the API groups (get on nonResourceURLs /api, /apis).");
        ValidationError::CatalogUnavailable(e.to_string())
    })?;

    if catalog.is_empty() {
        error!("❌ Resource catalog is empty");
        return Err(ValidationError::EmptyCatalog);
    }

    let resolver = KindResolver::from_catalog(&catalog);
    info!("✅ Catalog lists {} resource kinds", resolver.len());

    let mut unresolved = 0;
    for spec in registry.iter() {
        match resolver.resolve(&spec.object) {
            Ok(kind) => info!("✅ {} -> {}", spec.name, kind),
            Err(e) => {
                unresolved += 1;
                warn!("⚠️  {}: {}", spec.name, e);
            }
        }
    }

    Ok(unresolved)
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("resource catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("resource catalog is empty")]
    EmptyCatalog,
}
