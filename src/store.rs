//! The resource store boundary.
//!
//! A [`ResourceStore`] supplies the resource catalog and lists the current
//! instances of a resolved kind. The live implementation talks to the API
//! server ([`crate::kube::KubeApiStore`]); [`StaticStore`] serves a snapshot
//! loaded from a file and backs offline runs and tests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::FetchError;
use crate::resolver::{CatalogEntry, ResourceKindDescriptor};
use crate::selector::{FieldSelector, LabelSelector};

/// Scope of one list call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ListQuery<'a> {
    pub namespace: Option<&'a str>,
    pub field_selector: Option<&'a str>,
    pub label_selector: Option<&'a str>,
}

/// Source of resource kinds and resource instances.
///
/// Calls are blocking. Implementations bound their own latency; no retries
/// are expected.
pub trait ResourceStore: Send + Sync {
    /// Returns every listable resource type, preferred versions first.
    fn catalog(&self) -> Result<Vec<CatalogEntry>, FetchError>;

    /// Returns the current instances of `kind` matching `query`, each as a
    /// document tree.
    fn list(&self, kind: &ResourceKindDescriptor, query: &ListQuery<'_>)
        -> Result<Vec<Value>, FetchError>;
}

/// File shape of an offline snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
    /// Documents keyed by kind name.
    #[serde(default)]
    pub resources: BTreeMap<String, Vec<Value>>,
}

/// A store serving a fixed snapshot.
#[derive(Debug, Clone)]
pub struct StaticStore {
    snapshot: StoreSnapshot,
}

impl StaticStore {
    pub fn new(snapshot: StoreSnapshot) -> Self {
        Self { snapshot }
    }

    /// Loads a snapshot; `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self, FetchError> {
        let content = fs::read_to_string(path).map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let snapshot: StoreSnapshot = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| FetchError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
            _ => serde_yaml::from_str(&content).map_err(|e| FetchError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?,
        };

        debug!(
            path = %path.display(),
            kinds = snapshot.catalog.len(),
            "Loaded offline resource snapshot"
        );
        Ok(Self::new(snapshot))
    }

    pub fn snapshot(&self) -> &StoreSnapshot {
        &self.snapshot
    }
}

impl ResourceStore for StaticStore {
    fn catalog(&self) -> Result<Vec<CatalogEntry>, FetchError> {
        Ok(self.snapshot.catalog.clone())
    }

    fn list(
        &self,
        kind: &ResourceKindDescriptor,
        query: &ListQuery<'_>,
    ) -> Result<Vec<Value>, FetchError> {
        let labels = query
            .label_selector
            .map(str::parse::<LabelSelector>)
            .transpose()
            .map_err(|e| FetchError::Config(format!("label selector: {e}")))?;
        let fields = query
            .field_selector
            .map(str::parse::<FieldSelector>)
            .transpose()
            .map_err(|e| FetchError::Config(format!("field selector: {e}")))?;

        let api_version = kind.api_version();
        let documents = self
            .snapshot
            .resources
            .get(&kind.kind)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let matching = documents
            .iter()
            .filter(|doc| {
                doc.get("apiVersion")
                    .and_then(Value::as_str)
                    .map_or(true, |v| v == api_version)
            })
            .filter(|doc| match query.namespace {
                Some(ns) => {
                    doc.pointer("/metadata/namespace").and_then(Value::as_str) == Some(ns)
                }
                None => true,
            })
            .filter(|doc| labels.as_ref().map_or(true, |s| s.matches(doc)))
            .filter(|doc| fields.as_ref().map_or(true, |s| s.matches(doc)))
            .cloned()
            .collect();

        Ok(matching)
    }
}
