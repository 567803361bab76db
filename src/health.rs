//! Health monitoring for the refresh cycle.
//!
//! The collector records every refresh report here. `get_health` turns the
//! last report into per-check percentages and statuses.
//!
//! # Usage
//!
//! ```rust
//! use kube_resource_exporter::{HealthConfig, HealthState, RefreshReport};
//!
//! let health_state = HealthState::new(HealthConfig::default());
//!
//! health_state.record_refresh(&RefreshReport {
//!     groups: 4,
//!     failed_groups: 1,
//!     kinds: 3,
//!     ..Default::default()
//! });
//!
//! let response = health_state.get_health();
//! println!("Overall status: {}", response.overall_status);
//! ```

use crate::health_config::{CheckHealthConfig, HealthConfig};
use crate::refresh::RefreshReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};

/// Health status for a single check.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckHealth {
    /// Name of the check (e.g., "fetch_failures").
    pub name: String,
    /// Failing items in the last refresh.
    pub current: usize,
    /// Items considered in the last refresh.
    pub total: usize,
    /// `current / total` as a percentage (0.0 to 100.0).
    pub percent: f64,
    pub larger_is_better: bool,
    /// Health status: "ok", "warn", or "critical".
    pub status: String,
}

/// Health response containing every check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub checks: Vec<CheckHealth>,
    /// The worst status among all checks.
    pub overall_status: String,
    pub refreshes: u64,
    pub documents: usize,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Counts of the last refresh, replaced as one value.
#[derive(Debug, Clone, Copy, Default)]
struct RecordedRefresh {
    groups: usize,
    failed_groups: usize,
    kinds: usize,
    unresolved_kinds: usize,
    documents: usize,
    refreshes: u64,
    at: Option<DateTime<Utc>>,
}

/// Thread-safe refresh health tracker.
pub struct HealthState {
    last: RwLock<RecordedRefresh>,
    config: Arc<HealthConfig>,
}

impl HealthState {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            last: RwLock::new(RecordedRefresh::default()),
            config: Arc::new(config),
        }
    }

    fn recorded(&self) -> RecordedRefresh {
        *self.last.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores the counts of a finished refresh.
    pub fn record_refresh(&self, report: &RefreshReport) {
        let mut last = self.last.write().unwrap_or_else(PoisonError::into_inner);
        *last = RecordedRefresh {
            groups: report.groups,
            failed_groups: report.failed_groups,
            kinds: report.kinds,
            unresolved_kinds: report.unresolved_kinds.len(),
            documents: report.documents,
            refreshes: last.refreshes + 1,
            at: Some(Utc::now()),
        };
    }

    pub fn refreshes(&self) -> u64 {
        self.recorded().refreshes
    }

    pub fn has_refreshed(&self) -> bool {
        self.refreshes() > 0
    }

    pub fn get_health(&self) -> HealthResponse {
        let last = self.recorded();
        let checks = vec![
            compute_check_health(
                "fetch_failures",
                last.failed_groups,
                last.groups,
                &self.config.fetch_failures,
            ),
            compute_check_health(
                "unresolved_kinds",
                last.unresolved_kinds,
                last.kinds,
                &self.config.unresolved_kinds,
            ),
        ];

        let overall_status = checks
            .iter()
            .map(|c| status_priority(&c.status))
            .max()
            .map(priority_to_status)
            .unwrap_or_else(|| "ok".to_string());

        HealthResponse {
            checks,
            overall_status,
            refreshes: last.refreshes,
            documents: last.documents,
            last_refresh: last.at,
        }
    }
}

fn compute_check_health(
    name: &str,
    current: usize,
    total: usize,
    config: &CheckHealthConfig,
) -> CheckHealth {
    let percent = if total == 0 {
        0.0
    } else {
        (current as f64) / (total as f64) * 100.0
    };

    CheckHealth {
        name: name.to_string(),
        current,
        total,
        percent,
        larger_is_better: config.larger_is_better,
        status: evaluate_status(
            percent,
            config.larger_is_better,
            config.warn_percent,
            config.critical_percent,
        ),
    }
}

/// Evaluates the health status based on a percentage and thresholds.
///
/// For `larger_is_better == false`: higher percent is worse
/// - status is "critical" if percent > critical_percent
/// - status is "warn" if percent > warn_percent
/// - otherwise "ok"
///
/// For `larger_is_better == true`: lower percent is worse
/// - status is "critical" if percent < critical_percent
/// - status is "warn" if percent < warn_percent
/// - otherwise "ok"
fn evaluate_status(
    percent: f64,
    larger_is_better: bool,
    warn_percent: Option<f64>,
    critical_percent: Option<f64>,
) -> String {
    let breached = |threshold: Option<f64>| match threshold {
        Some(limit) if larger_is_better => percent < limit,
        Some(limit) => percent > limit,
        None => false,
    };

    if breached(critical_percent) {
        "critical".to_string()
    } else if breached(warn_percent) {
        "warn".to_string()
    } else {
        "ok".to_string()
    }
}

/// Returns a numeric priority for status (higher = worse).
fn status_priority(status: &str) -> u8 {
    match status {
        "warn" => 1,
        "critical" => 2,
        _ => 0,
    }
}

fn priority_to_status(priority: u8) -> String {
    match priority {
        1 => "warn".to_string(),
        2 => "critical".to_string(),
        _ => "ok".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(groups: usize, failed: usize, kinds: usize, unresolved: usize) -> RefreshReport {
        RefreshReport {
            groups,
            failed_groups: failed,
            kinds,
            unresolved_kinds: (0..unresolved).map(|i| format!("Kind{i}")).collect(),
            documents: 10,
            duration_seconds: 0.1,
        }
    }

    fn check<'a>(response: &'a HealthResponse, name: &str) -> &'a CheckHealth {
        response.checks.iter().find(|c| c.name == name).unwrap()
    }

    #[test]
    fn test_health_state_new() {
        let state = HealthState::new(HealthConfig::default());
        assert!(!state.has_refreshed());
        let response = state.get_health();
        assert_eq!(response.overall_status, "ok");
        assert!(response.last_refresh.is_none());
    }

    #[test]
    fn test_clean_refresh_is_ok() {
        let state = HealthState::new(HealthConfig::default());
        state.record_refresh(&report(4, 0, 3, 0));

        let response = state.get_health();
        assert_eq!(response.overall_status, "ok");
        assert_eq!(response.refreshes, 1);
        assert_eq!(response.documents, 10);
        assert!(response.last_refresh.is_some());
    }

    #[test]
    fn test_any_failure_warns() {
        let state = HealthState::new(HealthConfig::default());
        state.record_refresh(&report(4, 1, 3, 0));

        let response = state.get_health();
        assert_eq!(response.overall_status, "warn");
        let failures = check(&response, "fetch_failures");
        assert!((failures.percent - 25.0).abs() < 0.01);
        assert_eq!(failures.status, "warn");
    }

    #[test]
    fn test_majority_unresolved_is_critical() {
        let state = HealthState::new(HealthConfig::default());
        state.record_refresh(&report(1, 0, 3, 2));

        let response = state.get_health();
        assert_eq!(check(&response, "unresolved_kinds").status, "critical");
        assert_eq!(check(&response, "fetch_failures").status, "ok");
        assert_eq!(response.overall_status, "critical");
    }

    #[test]
    fn test_larger_is_better() {
        let config = HealthConfig {
            fetch_failures: CheckHealthConfig {
                larger_is_better: true,
                warn_percent: Some(30.0),
                critical_percent: Some(10.0),
            },
            ..Default::default()
        };
        let state = HealthState::new(config);
        state.record_refresh(&report(10, 2, 1, 0));
        assert_eq!(check(&state.get_health(), "fetch_failures").status, "warn");

        state.record_refresh(&report(10, 5, 1, 0));
        assert_eq!(check(&state.get_health(), "fetch_failures").status, "ok");
    }

    #[test]
    fn test_no_thresholds() {
        let config = HealthConfig {
            fetch_failures: CheckHealthConfig {
                larger_is_better: false,
                warn_percent: None,
                critical_percent: None,
            },
            ..Default::default()
        };
        let state = HealthState::new(config);
        state.record_refresh(&report(2, 2, 1, 0));
        assert_eq!(check(&state.get_health(), "fetch_failures").status, "ok");
    }

    #[test]
    fn test_zero_totals_are_zero_percent() {
        let state = HealthState::new(HealthConfig::default());
        state.record_refresh(&report(0, 0, 0, 0));
        let response = state.get_health();
        assert!(response.checks.iter().all(|c| c.percent == 0.0));
    }

    #[test]
    fn test_check_health_serialization() {
        let health = CheckHealth {
            name: "fetch_failures".to_string(),
            current: 1,
            total: 2,
            percent: 50.0,
            larger_is_better: false,
            status: "warn".to_string(),
        };

        let json = serde_json::to_string(&health).unwrap();
        assert!(json.contains("fetch_failures"));
        assert!(json.contains("50.0"));
    }
}
