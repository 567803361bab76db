//! Error types for the extraction and caching engine.
//!
//! Every error here is recovered inside the component that raises it, except
//! `ConfigError`, which surfaces once while the metric registry is built.

use std::path::PathBuf;

/// A path expression could not be evaluated against a document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("path {path:?} did not resolve: {reason}")]
    NotFound { path: String, reason: String },

    #[error("invalid path expression {path:?}: {reason}")]
    Syntax { path: String, reason: String },
}

impl EvalError {
    pub(crate) fn not_found(path: &str, reason: impl Into<String>) -> Self {
        EvalError::NotFound {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn syntax(path: &str, reason: impl Into<String>) -> Self {
        EvalError::Syntax {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// A raw extracted value could not be turned into a number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to coerce {shape} to float64")]
pub struct CoercionError {
    pub shape: String,
}

/// A resource kind name is absent from both the kind and alias tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("resource kind not found: {name}")]
    NotFound { name: String },
}

/// A call to the resource store failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("resource store misconfigured: {0}")]
    Config(String),
}

/// A metric definition was rejected while building the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("metric {0:?} is declared more than once")]
    DuplicateName(String),

    #[error("invalid metric name {0:?}")]
    InvalidMetricName(String),

    #[error("metric {metric:?}: invalid label name {label:?}")]
    InvalidLabelName { metric: String, label: String },

    #[error("metric {metric:?}: properties.{field} must not be empty")]
    EmptyField { metric: String, field: &'static str },

    #[error("metric {metric:?}: unsupported resource source {source_type:?} (expected \"kubernetes\")")]
    UnsupportedSource { metric: String, source_type: String },

    #[error("metric {metric:?}: invalid {field}: {reason}")]
    Selector {
        metric: String,
        field: &'static str,
        reason: String,
    },

    #[error("metric {metric:?}: at most one key(...)/val(...) operator may appear across value and labels, found {count}")]
    MultipleEnumerations { metric: String, count: usize },
}
