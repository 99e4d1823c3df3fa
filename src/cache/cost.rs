//! Cost-aware concurrent cache.
//!
//! Entries carry a caller-supplied cost (roughly their memory footprint) and
//! the cache keeps the sum of resident costs under a fixed budget. Storage,
//! eviction and TinyLFU admission are delegated to [`moka`]: the entry cost
//! is the moka weight and the budget is its maximum capacity.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use moka::notification::RemovalCause;
use moka::sync::Cache;
use parking_lot::RwLock;

use super::metrics::{CacheMetrics, MetricsSnapshot};

/// Upper bound on the map slots reserved up front.
const MAX_INITIAL_CAPACITY: usize = 1 << 16;

/// Sizing for a [`CostCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostCacheConfig {
    /// Total cost budget.
    pub max_cost: u64,

    /// Expected number of distinct keys, used to presize the table.
    pub num_counters: usize,
}

impl CostCacheConfig {
    /// Configuration with the given budget and a small key table.
    pub fn with_max_cost(max_cost: u64) -> Self {
        Self {
            max_cost,
            num_counters: 1024,
        }
    }

    fn initial_capacity(&self) -> usize {
        (self.num_counters / 10).clamp(1, MAX_INITIAL_CAPACITY)
    }
}

#[derive(Clone)]
struct Entry<V> {
    value: V,
    cost: u32,
    /// Set once the entry has been seen resident after admission.
    admitted: Arc<AtomicBool>,
}

/// Concurrent key/value store bounded by total entry cost.
///
/// `get` and `set` never fail. A `set` may be refused by the admission
/// policy or dropped while a clear is in progress; callers treat that as
/// "not cached this time".
pub struct CostCache<V> {
    name: &'static str,
    entries: RwLock<Cache<String, Entry<V>>>,
    metrics: Arc<CacheMetrics>,
    config: CostCacheConfig,
}

impl<V: Clone + Send + Sync + 'static> CostCache<V> {
    /// Creates an empty cache.
    pub fn new(name: &'static str, config: CostCacheConfig) -> Self {
        let metrics = Arc::new(CacheMetrics::default());
        let entries = build(name, &config, &metrics);

        tracing::debug!(
            cache = name,
            max_cost = config.max_cost,
            initial_capacity = config.initial_capacity(),
            "Cache created"
        );

        Self {
            name,
            entries: RwLock::new(entries),
            metrics,
            config,
        }
    }

    /// Looks a key up, counting a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) => {
                self.metrics.record_hit();
                Some(entry.value)
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Tries to store a value. Returns whether it is resident afterwards.
    pub fn set(&self, key: impl Into<String>, value: V, cost: u64) -> bool {
        let key = key.into();

        let Some(entries) = self.entries.try_read() else {
            self.metrics.record_dropped();
            tracing::debug!(cache = self.name, "Set dropped during clear");
            return false;
        };

        let cost = match u32::try_from(cost) {
            Ok(weight) if cost <= self.config.max_cost => weight,
            _ => {
                self.metrics.record_rejected();
                tracing::debug!(
                    cache = self.name,
                    cost,
                    budget = self.config.max_cost,
                    "Entry exceeds budget"
                );
                return false;
            }
        };

        let replacing = entries.contains_key(key.as_str());
        let admitted = Arc::new(AtomicBool::new(replacing));
        entries.insert(
            key.clone(),
            Entry {
                value,
                cost,
                admitted: Arc::clone(&admitted),
            },
        );

        // Admission runs in moka's maintenance step; drive it now so the
        // outcome is observable to this caller.
        entries.run_pending_tasks();

        if !entries.contains_key(key.as_str()) {
            self.metrics.record_rejected();
            tracing::debug!(cache = self.name, cost, "Admission refused");
            return false;
        }

        admitted.store(true, Ordering::Release);
        if replacing {
            self.metrics.record_updated(u64::from(cost));
        } else {
            self.metrics.record_added(u64::from(cost));
        }
        true
    }

    /// Discards every entry and zeroes every counter.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        *entries = build(self.name, &self.config, &self.metrics);
        self.metrics.reset();
        tracing::debug!(cache = self.name, "Cache cleared");
    }

    /// Snapshot of counters and occupancy.
    pub fn metrics(&self) -> MetricsSnapshot {
        let entries = self.entries.read();
        entries.run_pending_tasks();
        self.metrics.snapshot(
            usize::try_from(entries.entry_count()).unwrap_or(usize::MAX),
            entries.weighted_size(),
            self.config.max_cost,
        )
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.metrics().entries
    }

    /// True when nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the costs of resident entries.
    pub fn resident_cost(&self) -> u64 {
        self.metrics().resident_cost
    }

    /// Configured budget.
    pub fn max_cost(&self) -> u64 {
        self.config.max_cost
    }

    /// Name used in logs and reports.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn build<V>(name: &str, config: &CostCacheConfig, metrics: &Arc<CacheMetrics>) -> Cache<String, Entry<V>>
where
    V: Clone + Send + Sync + 'static,
{
    let metrics = Arc::clone(metrics);
    Cache::builder()
        .name(name)
        .max_capacity(config.max_cost)
        .initial_capacity(config.initial_capacity())
        .weigher(|_key: &String, entry: &Entry<V>| entry.cost)
        .eviction_listener(move |_key: Arc<String>, entry: Entry<V>, cause: RemovalCause| {
            // Refused candidates are also reported as `Size`; `set` counts those.
            if matches!(cause, RemovalCause::Size) && entry.admitted.load(Ordering::Acquire) {
                metrics.record_evicted(u64::from(entry.cost));
            }
        })
        .build()
}

impl<V> fmt::Debug for CostCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CostCache")
            .field("name", &self.name)
            .field("max_cost", &self.config.max_cost)
            .finish()
    }
}
