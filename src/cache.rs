//! Per-cycle document batches.
//!
//! A refresh produces a fresh [`BatchSnapshot`] that maps every registered
//! metric to the documents fetched for it. Snapshots are never mutated; the
//! orchestrator swaps in a new one on each refresh.

use ahash::AHashMap as HashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::registry::{MetricRegistry, MetricSpec};
use crate::resolver::ResourceKindDescriptor;
use crate::store::ListQuery;

/// Documents of one fetch group, shared by every metric in the group.
pub type DocumentBatch = Arc<[Value]>;

/// Identity of one fetch: metrics with equal keys share a single list call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub kind: ResourceKindDescriptor,
    pub namespace: Option<String>,
    pub field_selector: Option<String>,
    pub label_selector: Option<String>,
}

impl FetchKey {
    pub fn for_metric(kind: ResourceKindDescriptor, spec: &MetricSpec) -> Self {
        Self {
            kind,
            namespace: spec.namespace.clone(),
            field_selector: spec.field_selector.clone(),
            label_selector: spec.label_selector.clone(),
        }
    }

    pub fn query(&self) -> ListQuery<'_> {
        ListQuery {
            namespace: self.namespace.as_deref(),
            field_selector: self.field_selector.as_deref(),
            label_selector: self.label_selector.as_deref(),
        }
    }
}

impl std::fmt::Display for FetchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ns) = &self.namespace {
            write!(f, " in {ns}")?;
        }
        if let Some(sel) = &self.label_selector {
            write!(f, " labels[{sel}]")?;
        }
        if let Some(sel) = &self.field_selector {
            write!(f, " fields[{sel}]")?;
        }
        Ok(())
    }
}

/// Immutable metric-name to batch map for one refresh cycle.
#[derive(Debug, Clone, Default)]
pub struct BatchSnapshot {
    batches: HashMap<String, DocumentBatch>,
}

impl BatchSnapshot {
    /// Every registered metric mapped to an empty batch.
    pub fn empty(registry: &MetricRegistry) -> Self {
        let empty: DocumentBatch = Arc::from(Vec::new());
        Self {
            batches: registry
                .iter()
                .map(|spec| (spec.name.clone(), Arc::clone(&empty)))
                .collect(),
        }
    }

    pub(crate) fn insert(&mut self, metric: &str, batch: DocumentBatch) {
        self.batches.insert(metric.to_string(), batch);
    }

    /// The batch for a metric; unknown metrics have no documents.
    pub fn batch(&self, metric: &str) -> &[Value] {
        self.batches.get(metric).map(|b| &b[..]).unwrap_or(&[])
    }

    /// Shared handle to a metric's batch, if the metric is known.
    pub fn shared(&self, metric: &str) -> Option<&DocumentBatch> {
        self.batches.get(metric)
    }

    pub fn metric_count(&self) -> usize {
        self.batches.len()
    }
}
