//! Fetch cache refresh.
//!
//! One refresh resolves every distinct kind name in the registry, groups
//! metrics by [`FetchKey`] so each group is listed exactly once, and returns a
//! new [`BatchSnapshot`]. A failing group only empties its own metrics.

use ahash::AHashMap as HashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::cache::{BatchSnapshot, DocumentBatch, FetchKey};
use crate::error::FetchError;
use crate::registry::MetricRegistry;
use crate::resolver::{KindResolver, ResourceKindDescriptor};
use crate::store::ResourceStore;

/// Minimum time between catalog rediscoveries triggered by unresolved kinds.
pub const DEFAULT_REDISCOVERY_INTERVAL: Duration = Duration::from_secs(300);

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshReport {
    /// Distinct fetch groups attempted.
    pub groups: usize,
    pub failed_groups: usize,
    /// Distinct kind names referenced by the registry.
    pub kinds: usize,
    pub unresolved_kinds: Vec<String>,
    /// Documents fetched across all groups.
    pub documents: usize,
    pub duration_seconds: f64,
}

/// Owns the store and resolver and produces batch snapshots.
pub struct Refresher {
    store: Arc<dyn ResourceStore>,
    resolver: KindResolver,
    last_discovery: Option<Instant>,
    rediscovery_interval: Duration,
}

impl Refresher {
    /// Creates a refresher with an empty resolver; the catalog is fetched on
    /// the first refresh unless [`Refresher::discover`] is called earlier.
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            resolver: KindResolver::default(),
            last_discovery: None,
            rediscovery_interval: DEFAULT_REDISCOVERY_INTERVAL,
        }
    }

    pub fn with_rediscovery_interval(mut self, interval: Duration) -> Self {
        self.rediscovery_interval = interval;
        self
    }

    /// Rebuilds the resolver from a fresh catalog. Returns the number of
    /// resolvable kinds.
    pub fn discover(&mut self) -> Result<usize, FetchError> {
        self.discover_at(Instant::now())
    }

    /// Discovery as if it happened at `now`. Only a successful catalog fetch
    /// starts the rediscovery interval; a failed one is retried on the next
    /// refresh.
    pub fn discover_at(&mut self, now: Instant) -> Result<usize, FetchError> {
        let catalog = self.store.catalog()?;
        self.resolver = KindResolver::from_catalog(&catalog);
        self.last_discovery = Some(now);
        info!(kinds = self.resolver.len(), "Resource kind resolver rebuilt");
        Ok(self.resolver.len())
    }

    pub fn resolver(&self) -> &KindResolver {
        &self.resolver
    }

    pub fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }

    fn rediscovery_due(&self, now: Instant) -> bool {
        self.last_discovery.map_or(true, |at| {
            now.saturating_duration_since(at) >= self.rediscovery_interval
        })
    }

    /// Resolves every name, rediscovering once if some fail and the interval
    /// allows it.
    fn resolve_all<'n>(
        &mut self,
        names: &[&'n str],
        now: Instant,
    ) -> (HashMap<&'n str, ResourceKindDescriptor>, Vec<String>) {
        let mut resolved = HashMap::new();
        let mut unresolved = Vec::new();
        for &name in names {
            match self.resolver.resolve(name) {
                Ok(descriptor) => {
                    resolved.insert(name, descriptor.clone());
                }
                Err(_) => unresolved.push(name),
            }
        }

        if !unresolved.is_empty() && self.rediscovery_due(now) {
            debug!(unresolved = ?unresolved, "Rediscovering resource kinds");
            match self.discover_at(now) {
                Ok(_) => unresolved.retain(|&name| match self.resolver.resolve(name) {
                    Ok(descriptor) => {
                        resolved.insert(name, descriptor.clone());
                        false
                    }
                    Err(_) => true,
                }),
                Err(e) => warn!(error = %e, "Resource discovery failed"),
            }
        }

        for name in &unresolved {
            warn!(kind = %name, "Resource kind not found; its metrics stay empty this cycle");
        }
        (resolved, unresolved.into_iter().map(str::to_string).collect())
    }

    /// Runs one refresh cycle over the registry.
    pub fn refresh(&mut self, registry: &MetricRegistry) -> (BatchSnapshot, RefreshReport) {
        self.refresh_at(registry, Instant::now())
    }

    /// One refresh cycle as if it started at `now`; `now` drives the
    /// rediscovery interval.
    #[instrument(skip(self, registry, now), fields(metrics = registry.len()))]
    pub fn refresh_at(
        &mut self,
        registry: &MetricRegistry,
        now: Instant,
    ) -> (BatchSnapshot, RefreshReport) {
        let started = Instant::now();

        let mut names: Vec<&str> = Vec::new();
        for spec in registry.iter() {
            if !names.contains(&spec.object.as_str()) {
                names.push(&spec.object);
            }
        }
        let (resolved, unresolved_kinds) = self.resolve_all(&names, now);

        let mut groups: Vec<(FetchKey, Vec<&str>)> = Vec::new();
        let mut group_index: HashMap<FetchKey, usize> = HashMap::new();
        for spec in registry.iter() {
            let Some(kind) = resolved.get(spec.object.as_str()) else {
                continue;
            };
            let key = FetchKey::for_metric(kind.clone(), spec);
            match group_index.get(&key) {
                Some(&i) => groups[i].1.push(&spec.name),
                None => {
                    group_index.insert(key.clone(), groups.len());
                    groups.push((key, vec![&spec.name]));
                }
            }
        }

        let mut snapshot = BatchSnapshot::empty(registry);
        let mut failed_groups = 0;
        let mut documents = 0;
        for (key, members) in &groups {
            match self.store.list(&key.kind, &key.query()) {
                Ok(items) => {
                    documents += items.len();
                    let batch: DocumentBatch = Arc::from(items);
                    for metric in members {
                        snapshot.insert(metric, Arc::clone(&batch));
                    }
                    debug!(group = %key, documents = batch.len(), metrics = members.len(), "Fetched group");
                }
                Err(e) => {
                    failed_groups += 1;
                    warn!(group = %key, error = %e, "Fetch failed; group metrics stay empty this cycle");
                }
            }
        }

        let report = RefreshReport {
            groups: groups.len(),
            failed_groups,
            kinds: names.len(),
            unresolved_kinds,
            documents,
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            groups = report.groups,
            failed_groups = report.failed_groups,
            documents = report.documents,
            duration_seconds = report.duration_seconds,
            "Refresh complete"
        );
        (snapshot, report)
    }
}
