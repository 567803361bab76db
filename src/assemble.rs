//! Result assembly: turns one metric's document batch into samples.
//!
//! Each document is processed on its own. Every expression is evaluated
//! before anything is emitted, so a document either contributes all of its
//! samples or none, and `values` and `label_vectors` never drift apart.

use serde_json::Value;
use tracing::debug;

use crate::error::EvalError;
use crate::path::{evaluate_expression, Evaluated, PathExpression, RawValue};
use crate::registry::{Enumeration, MetricSpec};
use crate::units::try_normalize;

/// Samples of one metric: parallel values and label vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    values: Vec<f64>,
    label_vectors: Vec<Vec<String>>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, value: f64, labels: Vec<String>) {
        self.values.push(value);
        self.label_vectors.push(labels);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn label_vectors(&self) -> &[Vec<String>] {
        &self.label_vectors
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[String])> {
        self.values
            .iter()
            .copied()
            .zip(self.label_vectors.iter().map(Vec::as_slice))
    }
}

/// Assembles every document of a batch, in batch order.
pub fn assemble(spec: &MetricSpec, batch: &[Value]) -> ExtractionResult {
    let mut result = ExtractionResult::new();
    for (index, document) in batch.iter().enumerate() {
        if let Err(e) = assemble_document(spec, document, &mut result) {
            debug!(metric = %spec.name, document = index, error = %e, "Skipping document");
        }
    }
    result
}

fn assemble_document(
    spec: &MetricSpec,
    document: &Value,
    out: &mut ExtractionResult,
) -> Result<(), EvalError> {
    let enumeration = spec.enumeration();

    let mut fixed = Vec::with_capacity(spec.labels.len());
    for (i, label) in spec.labels.iter().enumerate() {
        if enumeration == Enumeration::Label(i) {
            fixed.push(String::new());
        } else {
            fixed.push(scalar(document, &label.path)?.to_label());
        }
    }

    match enumeration {
        Enumeration::None => {
            let raw = scalar(document, &spec.value)?;
            out.push(normalized(spec, &raw), fixed);
        }
        Enumeration::Value => {
            for (key, value) in entries(document, &spec.value)? {
                let raw = match spec.value {
                    PathExpression::Keys(_) => RawValue::String(key),
                    _ => RawValue::from(value),
                };
                out.push(normalized(spec, &raw), fixed.clone());
            }
        }
        Enumeration::Label(slot) => {
            let raw = scalar(document, &spec.value)?;
            let value = normalized(spec, &raw);
            let path = &spec.labels[slot].path;
            for (key, entry) in entries(document, path)? {
                let mut labels = fixed.clone();
                labels[slot] = match path {
                    PathExpression::Values(_) => RawValue::from(entry).to_label(),
                    _ => key.to_string(),
                };
                out.push(value, labels);
            }
        }
    }
    Ok(())
}

fn scalar<'a>(document: &'a Value, expression: &'a PathExpression) -> Result<RawValue<'a>, EvalError> {
    match evaluate_expression(document, expression)? {
        Evaluated::Scalar(raw) => Ok(raw),
        Evaluated::Entries(_) => Err(EvalError::syntax(
            &expression.to_string(),
            "enumeration used where a single value is expected",
        )),
    }
}

fn entries<'a>(
    document: &'a Value,
    expression: &'a PathExpression,
) -> Result<Vec<(&'a str, &'a Value)>, EvalError> {
    match evaluate_expression(document, expression)? {
        Evaluated::Entries(entries) => Ok(entries),
        Evaluated::Scalar(_) => Err(EvalError::syntax(
            &expression.to_string(),
            "expected key(...) or val(...)",
        )),
    }
}

fn normalized(spec: &MetricSpec, raw: &RawValue<'_>) -> f64 {
    try_normalize(raw, &spec.unit).unwrap_or_else(|e| {
        debug!(metric = %spec.name, error = %e, "Value defaulted to 0");
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MetricDefinition, MetricProperties};
    use serde_json::json;

    fn spec(value: &str, unit: &str, labels: &[(&str, &str)]) -> MetricSpec {
        MetricSpec::compile(&MetricDefinition {
            name: "m".into(),
            help: "h".into(),
            metric_type: "gauge".into(),
            properties: MetricProperties {
                source: "kubernetes".into(),
                object: "Thing".into(),
                value: value.into(),
                unit: Some(unit.into()),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            },
        })
        .unwrap()
    }

    #[test]
    fn test_scalar_with_labels() {
        let s = spec("$.status.size", "MiB", &[("name", "$.metadata.name"), ("env", "prod")]);
        let batch = vec![json!({"metadata": {"name": "a"}, "status": {"size": 2}})];
        let result = assemble(&s, &batch);
        assert_eq!(result.values(), &[2_097_152.0]);
        assert_eq!(result.label_vectors(), &[vec!["prod".to_string(), "a".to_string()]]);
    }

    #[test]
    fn test_non_string_label_is_empty() {
        let s = spec("$.v", "count", &[("replicas", "$.spec.replicas")]);
        let result = assemble(&s, &[json!({"v": 1, "spec": {"replicas": 3}})]);
        assert_eq!(result.label_vectors()[0], vec![String::new()]);
    }

    #[test]
    fn test_value_side_key_enumeration_uses_keys() {
        let s = spec("key($.counts)", "count", &[]);
        let result = assemble(&s, &[json!({"counts": {"3": "x", "7": "y"}})]);
        assert_eq!(result.values(), &[3.0, 7.0]);
    }

    #[test]
    fn test_label_side_val_enumeration_uses_values() {
        let s = spec("$.v", "count", &[("owner", "val($.owners)")]);
        let result = assemble(&s, &[json!({"v": 5, "owners": {"a": "alice", "b": 9}})]);
        assert_eq!(result.values(), &[5.0, 5.0]);
        assert_eq!(
            result.label_vectors(),
            &[vec!["alice".to_string()], vec![String::new()]]
        );
    }

    #[test]
    fn test_missing_label_skips_document() {
        let s = spec("$.v", "count", &[("name", "$.metadata.name")]);
        let batch = vec![json!({"v": 1}), json!({"v": 2, "metadata": {"name": "b"}})];
        let result = assemble(&s, &batch);
        assert_eq!(result.values(), &[2.0]);
    }

    #[test]
    fn test_missing_enumeration_target_yields_nothing() {
        let s = spec("val($.spec.limits)", "count", &[]);
        assert!(assemble(&s, &[json!({"spec": {}})]).is_empty());
    }

    #[test]
    fn test_malformed_path_skips_every_document() {
        let s = spec("$..v", "count", &[]);
        assert!(assemble(&s, &[json!({"v": 1}), json!({"v": 2})]).is_empty());
    }

    #[test]
    fn test_iter_pairs_values_with_labels() {
        let s = spec("$.v", "count", &[("k", "$.k")]);
        let result = assemble(&s, &[json!({"v": 1, "k": "x"}), json!({"v": 2, "k": "y"})]);
        let pairs: Vec<(f64, Vec<String>)> = result.iter().map(|(v, l)| (v, l.to_vec())).collect();
        assert_eq!(pairs, vec![(1.0, vec!["x".to_string()]), (2.0, vec!["y".to_string()])]);
    }
}
