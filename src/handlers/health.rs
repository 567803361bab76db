//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! the state of the last refresh as a plain-text report.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use kube_resource_exporter::HealthResponse;
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = concat!("kube-resource-exporter ", env!("CARGO_PKG_VERSION"));

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let health = state.health_state.get_health();

    // Unavailable until the first refresh has completed
    let (status, message) = if !state.health_state.has_refreshed() {
        (StatusCode::SERVICE_UNAVAILABLE, "Waiting for first refresh")
    } else if health.overall_status == "ok" {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::OK, "OK - Degraded refresh")
    };

    let uptime_str = format_uptime(state.start_time.elapsed().as_secs());
    let table = render_checks(&health);

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\n\n{table}\n{FOOTER_TEXT}"),
    )
}

fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Renders refresh health as a plain-text table.
fn render_checks(health: &HealthResponse) -> String {
    let mut out = String::new();
    writeln!(out, "REFRESH HEALTH").ok();
    writeln!(out, "==============").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:20} | {:>8} | {:>8} | {:>8} | {:>10}",
        "Check", "Current", "Total", "Percent", "Status"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(66)).ok();

    for check in &health.checks {
        writeln!(
            out,
            "{:20} | {:>8} | {:>8} | {:>7.1}% | {:>10}",
            check.name, check.current, check.total, check.percent, check.status
        )
        .ok();
    }

    writeln!(out).ok();
    writeln!(out, "Refreshes:      {}", health.refreshes).ok();
    writeln!(out, "Documents:      {}", health.documents).ok();
    writeln!(
        out,
        "Last refresh:   {}",
        health
            .last_refresh
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string())
    )
    .ok();
    writeln!(out, "Overall Status: {}", health.overall_status).ok();
    out
}
