//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use kube_resource_exporter::{HealthState, ResourceCollector};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::metrics::ExporterMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Registry holding the resource collector.
    pub registry: Registry,
    pub collector: Arc<ResourceCollector>,
    /// Self-telemetry, absent when disabled.
    pub telemetry: Option<ExporterMetrics>,
    pub health_state: Arc<HealthState>,
    pub config: Arc<Config>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
