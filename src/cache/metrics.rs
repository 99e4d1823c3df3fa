//! Atomic counters for a cost-aware cache.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters, updated without locks.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    keys_added: AtomicU64,
    keys_updated: AtomicU64,
    keys_evicted: AtomicU64,
    cost_added: AtomicU64,
    cost_evicted: AtomicU64,
    sets_dropped: AtomicU64,
    sets_rejected: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_added(&self, cost: u64) {
        self.keys_added.fetch_add(1, Ordering::Relaxed);
        self.cost_added.fetch_add(cost, Ordering::Relaxed);
    }

    pub(crate) fn record_updated(&self, cost: u64) {
        self.keys_updated.fetch_add(1, Ordering::Relaxed);
        self.cost_added.fetch_add(cost, Ordering::Relaxed);
    }

    pub(crate) fn record_evicted(&self, cost: u64) {
        self.keys_evicted.fetch_add(1, Ordering::Relaxed);
        self.cost_evicted.fetch_add(cost, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.sets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.sets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.keys_added,
            &self.keys_updated,
            &self.keys_evicted,
            &self.cost_added,
            &self.cost_evicted,
            &self.sets_dropped,
            &self.sets_rejected,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self, entries: usize, resident_cost: u64, max_cost: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys_added: self.keys_added.load(Ordering::Relaxed),
            keys_updated: self.keys_updated.load(Ordering::Relaxed),
            keys_evicted: self.keys_evicted.load(Ordering::Relaxed),
            cost_added: self.cost_added.load(Ordering::Relaxed),
            cost_evicted: self.cost_evicted.load(Ordering::Relaxed),
            sets_dropped: self.sets_dropped.load(Ordering::Relaxed),
            sets_rejected: self.sets_rejected.load(Ordering::Relaxed),
            entries,
            resident_cost,
            max_cost,
        }
    }
}

/// Point-in-time copy of a cache's counters and occupancy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    /// Entries admitted.
    pub keys_added: u64,
    pub keys_updated: u64,
    pub keys_evicted: u64,
    pub cost_added: u64,
    pub cost_evicted: u64,
    /// Sets abandoned because the shard was contended.
    pub sets_dropped: u64,
    /// Sets refused by the admission policy or for exceeding the budget.
    pub sets_rejected: u64,
    /// Entries currently resident.
    pub entries: usize,
    pub resident_cost: u64,
    pub max_cost: u64,
}

impl MetricsSnapshot {
    /// Fraction of lookups that hit.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// True when every counter and the occupancy are zero.
    pub fn is_empty(&self) -> bool {
        *self
            == Self {
                max_cost: self.max_cost,
                ..Self::default()
            }
    }
}
