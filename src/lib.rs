//! Kubernetes Resource Exporter Library
//!
//! Turns fields of arbitrary Kubernetes resources into Prometheus time series.
//! Operators declare, per metric, a resource kind, a path expression locating
//! the value inside each resource, a unit, and label path expressions. The
//! library fetches the resources, evaluates the expressions and exposes the
//! samples through a [`prometheus::core::Collector`].
//!
//! # Features
//!
//! - **Path expressions**: `$`-rooted lookups, constants, and the `key(...)` /
//!   `val(...)` operators that expand one resource into many samples
//! - **Unit normalization**: `ms`, `microsec`, `Mb`, `MiB` scaled to base units
//! - **Shared fetches**: metrics observing the same kind and selector share one list call
//! - **Throttled refresh**: at most one refresh per minimum interval, serialized by a lock
//!
//! # Usage
//!
//! ```rust
//! use kube_resource_exporter::{
//!     MetricDefinition, MetricRegistry, Refresher, ResourceCollector, StaticStore,
//!     StoreSnapshot, DEFAULT_MIN_REFRESH_INTERVAL,
//! };
//! use std::sync::Arc;
//!
//! let defs: Vec<MetricDefinition> = serde_yaml::from_str(r#"
//! - name: backup_size_bytes
//!   help: Size of the last backup
//!   type: gauge
//!   properties:
//!     object: Backup
//!     value: $.status.size
//!     unit: MiB
//!     labels:
//!       name: $.metadata.name
//! "#).unwrap();
//!
//! let (registry, errors) = MetricRegistry::from_definitions(&defs);
//! assert!(errors.is_empty());
//!
//! let store = Arc::new(StaticStore::new(StoreSnapshot::default()));
//! let collector = ResourceCollector::new(
//!     Arc::new(registry),
//!     Refresher::new(store),
//!     DEFAULT_MIN_REFRESH_INTERVAL,
//! ).unwrap();
//!
//! let prom = prometheus::Registry::new();
//! prom.register(Box::new(collector)).unwrap();
//! let families = prom.gather();
//! ```

pub mod assemble;
pub mod cache;
pub mod collector;
pub mod error;
pub mod health;
pub mod health_config;
pub mod kube;
pub mod kubeconfig;
pub mod path;
pub mod refresh;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod store;
pub mod units;

// Re-export main types for convenience
pub use assemble::{assemble, ExtractionResult};
pub use cache::{BatchSnapshot, DocumentBatch, FetchKey};
pub use collector::{
    CollectorStatus, ResourceCollector, SharedCollector, DEFAULT_MIN_REFRESH_INTERVAL,
};
pub use error::{CoercionError, ConfigError, EvalError, FetchError, ResolveError};
pub use health::{CheckHealth, HealthResponse, HealthState};
pub use health_config::{CheckHealthConfig, HealthConfig};
pub use kube::{Auth, ConnectOptions, KubeApiStore, KubeClientConfig};
pub use kubeconfig::{ExecCredentialProvider, Kubeconfig};
pub use path::{evaluate, PathExpression, RawValue};
pub use refresh::{RefreshReport, Refresher};
pub use registry::{MetricDefinition, MetricKind, MetricProperties, MetricRegistry, MetricSpec};
pub use resolver::{CatalogEntry, KindResolver, ResourceKindDescriptor};
pub use store::{ListQuery, ResourceStore, StaticStore, StoreSnapshot};
pub use units::{normalize, Unit};
