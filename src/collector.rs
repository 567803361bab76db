//! Scrape orchestration as a Prometheus collector.
//!
//! `desc` reads only the descriptors built at construction. `collect` takes
//! the scrape lock, refreshes the batch snapshot when the minimum interval
//! has passed since the last refresh completed, then assembles every metric
//! from the current snapshot. Both run synchronously on the caller's thread;
//! `collect` may block on the resource store.

use prometheus::core::{Collector, Desc};
use prometheus::proto::{self, LabelPair, Metric, MetricFamily, MetricType};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::assemble::{assemble, ExtractionResult};
use crate::cache::BatchSnapshot;
use crate::health::HealthState;
use crate::refresh::{RefreshReport, Refresher};
use crate::registry::{MetricKind, MetricRegistry, MetricSpec};

/// Minimum time between two refreshes.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(25);

struct ScrapeState {
    refresher: Refresher,
    snapshot: BatchSnapshot,
    /// Completion instant of the last refresh.
    last_refresh: Option<Instant>,
    last_report: Option<RefreshReport>,
    refreshes: u64,
}

/// Point-in-time view of the collector for telemetry and health.
#[derive(Debug, Clone, Default)]
pub struct CollectorStatus {
    pub refreshes: u64,
    pub last_refresh: Option<Instant>,
    pub last_report: Option<RefreshReport>,
}

pub struct ResourceCollector {
    registry: Arc<MetricRegistry>,
    descs: Vec<Desc>,
    min_interval: Duration,
    state: Mutex<ScrapeState>,
    health: Option<Arc<HealthState>>,
}

impl ResourceCollector {
    pub fn new(
        registry: Arc<MetricRegistry>,
        refresher: Refresher,
        min_interval: Duration,
    ) -> prometheus::Result<Self> {
        let descs = registry
            .iter()
            .map(|spec| {
                Desc::new(
                    spec.name.clone(),
                    spec.help.clone(),
                    spec.label_names(),
                    Default::default(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        let snapshot = BatchSnapshot::empty(&registry);
        Ok(Self {
            registry,
            descs,
            min_interval,
            state: Mutex::new(ScrapeState {
                refresher,
                snapshot,
                last_refresh: None,
                last_report: None,
                refreshes: 0,
            }),
            health: None,
        })
    }

    /// Records every refresh report into `health`.
    pub fn with_health(mut self, health: Arc<HealthState>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn status(&self) -> CollectorStatus {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        CollectorStatus {
            refreshes: state.refreshes,
            last_refresh: state.last_refresh,
            last_report: state.last_report.clone(),
        }
    }

    /// One scrape as if it happened at `now`.
    #[instrument(skip(self, now), fields(metrics = self.registry.len()))]
    pub fn collect_at(&self, now: Instant) -> Vec<MetricFamily> {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let state = &mut *guard;

        let due = state
            .last_refresh
            .map_or(true, |last| now.saturating_duration_since(last) >= self.min_interval);
        if due {
            let started = Instant::now();
            let (snapshot, report) = state.refresher.refresh_at(&self.registry, now);
            state.snapshot = snapshot;
            state.last_refresh = Some(now + started.elapsed());
            state.refreshes += 1;
            if let Some(health) = &self.health {
                health.record_refresh(&report);
            }
            state.last_report = Some(report);
        } else {
            debug!("Serving cached batches");
        }

        self.registry
            .iter()
            .filter_map(|spec| {
                let result = assemble(spec, state.snapshot.batch(&spec.name));
                family(spec, &result)
            })
            .collect()
    }
}

impl Collector for ResourceCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.collect_at(Instant::now())
    }
}

/// Registrable handle to a collector that is also kept elsewhere.
#[derive(Clone)]
pub struct SharedCollector(pub Arc<ResourceCollector>);

impl Collector for SharedCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.0.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.0.collect()
    }
}

/// Builds the exposition family for one metric; `None` when it has no samples.
pub fn family(spec: &MetricSpec, result: &ExtractionResult) -> Option<MetricFamily> {
    if result.is_empty() {
        return None;
    }

    let metrics = result
        .iter()
        .map(|(value, labels)| {
            let pairs = spec
                .labels
                .iter()
                .zip(labels)
                .map(|(label, label_value)| {
                    let mut pair = LabelPair::default();
                    pair.set_name(label.name.clone());
                    pair.set_value(label_value.clone());
                    pair
                })
                .collect();

            let mut m = Metric::default();
            m.set_label(pairs);
            match spec.kind {
                MetricKind::Counter => {
                    let mut c = proto::Counter::default();
                    c.set_value(value);
                    m.set_counter(c);
                }
                MetricKind::Gauge => {
                    let mut g = proto::Gauge::default();
                    g.set_value(value);
                    m.set_gauge(g);
                }
                MetricKind::Untyped => {
                    let mut u = proto::Untyped::default();
                    u.set_value(value);
                    m.untyped = Some(u).into();
                }
            }
            m
        })
        .collect();

    let mut mf = MetricFamily::default();
    mf.set_name(spec.name.clone());
    mf.set_help(spec.help.clone());
    mf.set_field_type(match spec.kind {
        MetricKind::Counter => MetricType::COUNTER,
        MetricKind::Gauge => MetricType::GAUGE,
        MetricKind::Untyped => MetricType::UNTYPED,
    });
    mf.set_metric(metrics);
    Some(mf)
}
