//! Internal `kube_resource_exporter_*` metrics.
//!
//! Kept in their own registry so the handler can update them after the
//! resource collector ran and still expose the values of the same scrape.

use kube_resource_exporter::CollectorStatus;
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, Registry};

/// Exporter self-telemetry gauges.
#[derive(Clone)]
pub struct ExporterMetrics {
    registry: Registry,
    pub scrape_duration: Gauge,
    pub refresh_duration: Gauge,
    pub fetch_groups: Gauge,
    pub fetch_failures: Gauge,
    pub unresolved_kinds: Gauge,
    pub documents: Gauge,
    pub metrics_registered: Gauge,
}

impl ExporterMetrics {
    /// Creates and registers all telemetry gauges.
    pub fn new(metrics_registered: usize) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let scrape_duration = Gauge::new(
            "kube_resource_exporter_scrape_duration_seconds",
            "Time spent serving the last /metrics request",
        )?;
        let refresh_duration = Gauge::new(
            "kube_resource_exporter_refresh_duration_seconds",
            "Duration of the last refresh of the resource lists",
        )?;
        let fetch_groups = Gauge::new(
            "kube_resource_exporter_fetch_groups",
            "Distinct (kind, selector) list calls in the last refresh",
        )?;
        let fetch_failures = Gauge::new(
            "kube_resource_exporter_fetch_failures",
            "List calls that failed in the last refresh",
        )?;
        let unresolved_kinds = Gauge::new(
            "kube_resource_exporter_unresolved_kinds",
            "Configured kind names that did not resolve in the last refresh",
        )?;
        let documents = Gauge::new(
            "kube_resource_exporter_documents",
            "Resources fetched in the last refresh",
        )?;
        let metrics_registered_gauge = Gauge::new(
            "kube_resource_exporter_metrics_registered",
            "Metric definitions that compiled and are exported",
        )?;

        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(refresh_duration.clone()))?;
        registry.register(Box::new(fetch_groups.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(unresolved_kinds.clone()))?;
        registry.register(Box::new(documents.clone()))?;
        registry.register(Box::new(metrics_registered_gauge.clone()))?;

        metrics_registered_gauge.set(metrics_registered as f64);

        Ok(Self {
            registry,
            scrape_duration,
            refresh_duration,
            fetch_groups,
            fetch_failures,
            unresolved_kinds,
            documents,
            metrics_registered: metrics_registered_gauge,
        })
    }

    /// Copies the last refresh report into the gauges.
    pub fn observe(&self, status: &CollectorStatus) {
        if let Some(report) = &status.last_report {
            self.refresh_duration.set(report.duration_seconds);
            self.fetch_groups.set(report.groups as f64);
            self.fetch_failures.set(report.failed_groups as f64);
            self.unresolved_kinds
                .set(report.unresolved_kinds.len() as f64);
            self.documents.set(report.documents as f64);
        }
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}
