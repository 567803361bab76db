//! Configuration types for refresh health monitoring.
//!
//! Each check turns a refresh report into a percentage (failed fetch groups,
//! unresolved kinds) and compares it with optional thresholds.

use serde::{Deserialize, Serialize};

/// Thresholds for a single health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckHealthConfig {
    /// If true, higher percentages are healthy and thresholds are lower bounds.
    #[serde(default)]
    pub larger_is_better: bool,
    /// For `larger_is_better=false`: warn when percent > warn_percent
    /// For `larger_is_better=true`: warn when percent < warn_percent
    pub warn_percent: Option<f64>,
    /// For `larger_is_better=false`: critical when percent > critical_percent
    /// For `larger_is_better=true`: critical when percent < critical_percent
    pub critical_percent: Option<f64>,
}

impl Default for CheckHealthConfig {
    fn default() -> Self {
        Self {
            larger_is_better: false,
            warn_percent: Some(0.0),
            critical_percent: Some(50.0),
        }
    }
}

/// Health thresholds for every refresh check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Share of fetch groups that failed in the last refresh.
    #[serde(default)]
    pub fetch_failures: CheckHealthConfig,
    /// Share of referenced kind names that could not be resolved.
    #[serde(default)]
    pub unresolved_kinds: CheckHealthConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_health_config_default() {
        let config = CheckHealthConfig::default();
        assert!(!config.larger_is_better);
        assert_eq!(config.warn_percent, Some(0.0));
        assert_eq!(config.critical_percent, Some(50.0));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: HealthConfig =
            serde_yaml::from_str("fetch_failures:\n  warn_percent: 10\n  critical_percent: 90\n")
                .unwrap();
        assert_eq!(config.fetch_failures.warn_percent, Some(10.0));
        assert_eq!(config.unresolved_kinds, CheckHealthConfig::default());
    }
}
