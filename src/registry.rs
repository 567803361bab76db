//! Metric definitions and the compiled metric registry.
//!
//! A [`MetricDefinition`] is the configuration shape of one metric. Compiling
//! it validates names, selectors and the enumeration rule and produces a
//! [`MetricSpec`], the extraction plan used on every scrape. The registry is
//! built once at startup and never mutated afterwards.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::ConfigError;
use crate::path::PathExpression;
use crate::selector::{FieldSelector, LabelSelector};
use crate::units::Unit;

/// The only resource source this exporter knows how to fetch from.
pub const KUBERNETES_SOURCE: &str = "kubernetes";

static METRIC_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("valid metric name regex"));
static LABEL_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("valid label name regex"));

/// One metric as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub help: String,
    /// `counter`, `gauge` or `untyped`.
    #[serde(rename = "type", default)]
    pub metric_type: String,
    pub properties: MetricProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricProperties {
    /// Resource source; only `kubernetes`.
    #[serde(rename = "type", default = "default_source")]
    pub source: String,
    /// Resource kind name, short name or plural.
    pub object: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
    /// Label name to path expression. Must stay the last field for TOML output.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_source() -> String {
    KUBERNETES_SOURCE.to_string()
}

/// Exposition value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Untyped,
}

impl MetricKind {
    /// Unknown or empty type names fall back to `Untyped`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            "untyped" | "" => Some(MetricKind::Untyped),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Untyped => "untyped",
        }
    }
}

/// A label name and the expression that fills it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    pub name: String,
    pub path: PathExpression,
}

/// Which expression, if any, drives per-document sample expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enumeration {
    None,
    Value,
    /// Index into [`MetricSpec::labels`].
    Label(usize),
}

/// Compiled extraction plan for one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub object: String,
    pub namespace: Option<String>,
    pub field_selector: Option<String>,
    pub label_selector: Option<String>,
    pub value: PathExpression,
    pub unit: Unit,
    /// Ordered by name, with an enumerating label (if any) last.
    pub labels: Vec<LabelSpec>,
}

impl MetricSpec {
    /// Compiles a definition. Path expressions are classified here but only
    /// walked at evaluation time.
    pub fn compile(def: &MetricDefinition) -> Result<Self, ConfigError> {
        if !METRIC_NAME_RE.is_match(&def.name) {
            return Err(ConfigError::InvalidMetricName(def.name.clone()));
        }
        let props = &def.properties;
        if props.source != KUBERNETES_SOURCE {
            return Err(ConfigError::UnsupportedSource {
                metric: def.name.clone(),
                source_type: props.source.clone(),
            });
        }
        if props.object.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                metric: def.name.clone(),
                field: "object",
            });
        }
        if props.value.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                metric: def.name.clone(),
                field: "value",
            });
        }

        let field_selector = non_empty(&props.field_selector);
        if let Some(raw) = field_selector {
            raw.parse::<FieldSelector>()
                .map_err(|e| ConfigError::Selector {
                    metric: def.name.clone(),
                    field: "fieldSelector",
                    reason: e.to_string(),
                })?;
        }
        let label_selector = non_empty(&props.label_selector);
        if let Some(raw) = label_selector {
            raw.parse::<LabelSelector>()
                .map_err(|e| ConfigError::Selector {
                    metric: def.name.clone(),
                    field: "labelSelector",
                    reason: e.to_string(),
                })?;
        }

        let mut labels = Vec::with_capacity(props.labels.len());
        for (name, path) in &props.labels {
            if !LABEL_NAME_RE.is_match(name) || name.starts_with("__") {
                return Err(ConfigError::InvalidLabelName {
                    metric: def.name.clone(),
                    label: name.clone(),
                });
            }
            labels.push(LabelSpec {
                name: name.clone(),
                path: PathExpression::parse(path),
            });
        }

        let value = PathExpression::parse(&props.value);
        let enumerations = usize::from(value.is_enumeration())
            + labels.iter().filter(|l| l.path.is_enumeration()).count();
        if enumerations > 1 {
            return Err(ConfigError::MultipleEnumerations {
                metric: def.name.clone(),
                count: enumerations,
            });
        }

        let kind = MetricKind::parse(&def.metric_type).unwrap_or_else(|| {
            warn!(
                metric = %def.name,
                metric_type = %def.metric_type,
                "Unknown metric type, exposing as untyped"
            );
            MetricKind::Untyped
        });

        let help = if def.help.trim().is_empty() {
            format!("{} of {} resources", props.value.trim(), props.object.trim())
        } else {
            def.help.clone()
        };

        Ok(Self {
            name: def.name.clone(),
            help,
            kind,
            object: props.object.trim().to_string(),
            namespace: non_empty(&props.namespace).map(str::to_string),
            field_selector: field_selector.map(str::to_string),
            label_selector: label_selector.map(str::to_string),
            value,
            unit: props.unit.as_deref().map(Unit::parse).unwrap_or_default(),
            labels: enumeration_last(labels),
        })
    }

    pub fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn enumeration(&self) -> Enumeration {
        if self.value.is_enumeration() {
            return Enumeration::Value;
        }
        match self.labels.iter().position(|l| l.path.is_enumeration()) {
            Some(index) => Enumeration::Label(index),
            None => Enumeration::None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Moves the enumerating label to the end, keeping the others in order.
fn enumeration_last(labels: Vec<LabelSpec>) -> Vec<LabelSpec> {
    let (enumerating, mut ordered): (Vec<_>, Vec<_>) =
        labels.into_iter().partition(|l| l.path.is_enumeration());
    ordered.extend(enumerating);
    ordered
}

/// The set of compiled metrics, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: Vec<MetricSpec>,
    index: HashMap<String, usize>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and adds one definition. A rejected definition leaves the
    /// registry unchanged.
    pub fn register(&mut self, def: &MetricDefinition) -> Result<(), ConfigError> {
        if self.index.contains_key(&def.name) {
            return Err(ConfigError::DuplicateName(def.name.clone()));
        }
        let spec = MetricSpec::compile(def)?;
        self.index.insert(spec.name.clone(), self.metrics.len());
        self.metrics.push(spec);
        Ok(())
    }

    /// Registers every definition it can; failures are logged and returned,
    /// never fatal for the other metrics.
    pub fn from_definitions(defs: &[MetricDefinition]) -> (Self, Vec<ConfigError>) {
        let mut registry = Self::new();
        let mut errors = Vec::new();
        for def in defs {
            if let Err(e) = registry.register(def) {
                warn!(metric = %def.name, error = %e, "Metric excluded from registry");
                errors.push(e);
            }
        }
        (registry, errors)
    }

    pub fn get(&self, name: &str) -> Option<&MetricSpec> {
        self.index.get(name).map(|&i| &self.metrics[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricSpec> {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, value: &str, labels: &[(&str, &str)]) -> MetricDefinition {
        MetricDefinition {
            name: name.to_string(),
            help: "help".to_string(),
            metric_type: "gauge".to_string(),
            properties: MetricProperties {
                source: KUBERNETES_SOURCE.to_string(),
                object: "Pod".to_string(),
                value: value.to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_definition_from_yaml() {
        let yaml = r#"
name: backup_size_bytes
help: Size of the last backup
type: gauge
properties:
  object: Backup
  value: $.status.size
  unit: MiB
  namespace: backups
  labelSelector: app=db
  labels:
    name: $.metadata.name
    cluster: east
"#;
        let def: MetricDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.properties.source, "kubernetes");
        assert_eq!(def.properties.label_selector.as_deref(), Some("app=db"));

        let spec = MetricSpec::compile(&def).unwrap();
        assert_eq!(spec.kind, MetricKind::Gauge);
        assert_eq!(spec.unit, Unit::Mebibytes);
        assert_eq!(spec.namespace.as_deref(), Some("backups"));
        assert_eq!(spec.label_names(), vec!["cluster", "name"]);
        assert_eq!(spec.enumeration(), Enumeration::None);
    }

    #[test]
    fn test_enumerating_label_moves_last() {
        let def = definition(
            "pod_labels",
            "$.status.ready",
            &[("key", "key($.metadata.labels)"), ("name", "$.metadata.name"), ("zone", "eu")],
        );
        let spec = MetricSpec::compile(&def).unwrap();
        assert_eq!(spec.label_names(), vec!["name", "zone", "key"]);
        assert_eq!(spec.enumeration(), Enumeration::Label(2));
    }

    #[test]
    fn test_defaults() {
        let mut def = definition("plain", "$.spec.replicas", &[]);
        def.help.clear();
        def.metric_type = "histogram".to_string();
        let spec = MetricSpec::compile(&def).unwrap();
        assert_eq!(spec.kind, MetricKind::Untyped);
        assert_eq!(spec.unit, Unit::Count);
        assert!(!spec.help.is_empty());
    }

    #[test]
    fn test_rejections() {
        let bad_name = definition("1bad", "$.a", &[]);
        assert_eq!(
            MetricSpec::compile(&bad_name),
            Err(ConfigError::InvalidMetricName("1bad".into()))
        );

        let bad_label = definition("m", "$.a", &[("__reserved", "x")]);
        assert!(matches!(
            MetricSpec::compile(&bad_label),
            Err(ConfigError::InvalidLabelName { .. })
        ));

        let mut empty_object = definition("m", "$.a", &[]);
        empty_object.properties.object.clear();
        assert!(matches!(
            MetricSpec::compile(&empty_object),
            Err(ConfigError::EmptyField { field: "object", .. })
        ));

        let mut other_source = definition("m", "$.a", &[]);
        other_source.properties.source = "docker".into();
        assert!(matches!(
            MetricSpec::compile(&other_source),
            Err(ConfigError::UnsupportedSource { .. })
        ));

        let mut bad_selector = definition("m", "$.a", &[]);
        bad_selector.properties.label_selector = Some("app in (a".into());
        assert!(matches!(
            MetricSpec::compile(&bad_selector),
            Err(ConfigError::Selector { field: "labelSelector", .. })
        ));

        let dual = definition("m", "val($.spec.limits)", &[("k", "key($.spec.limits)")]);
        assert_eq!(
            MetricSpec::compile(&dual),
            Err(ConfigError::MultipleEnumerations { metric: "m".into(), count: 2 })
        );
    }

    #[test]
    fn test_registry_skips_failures_and_duplicates() {
        let defs = vec![
            definition("first", "$.a", &[]),
            definition("first", "$.b", &[]),
            definition("bad name", "$.c", &[]),
            definition("second", "$.d", &[]),
        ];
        let (registry, errors) = MetricRegistry::from_definitions(&defs);
        assert_eq!(registry.len(), 2);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], ConfigError::DuplicateName("first".into()));
        assert_eq!(
            registry.get("first").unwrap().value,
            PathExpression::Lookup("$.a".into())
        );
        let names: Vec<&str> = registry.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
