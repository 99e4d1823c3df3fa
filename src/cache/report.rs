//! Combined statistics for the program and document caches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::metrics::MetricsSnapshot;

/// Snapshot of both caches taken at one moment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheReport {
    /// Compiled program cache.
    pub program: MetricsSnapshot,

    /// Parsed JSON document cache.
    pub json: MetricsSnapshot,

    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
}

impl CacheReport {
    /// Builds a report from the two cache snapshots.
    pub fn new(program: MetricsSnapshot, json: MetricsSnapshot) -> Self {
        Self {
            program,
            json,
            captured_at: Utc::now(),
        }
    }

    /// Resident cost of both caches together, in bytes.
    pub fn memory_usage(&self) -> u64 {
        self.program.resident_cost + self.json.resident_cost
    }

    /// Flat object with `program_*` and `json_*` keys.
    pub fn to_flat_json(&self) -> Value {
        let mut flat = Map::new();
        append_prefixed(&mut flat, "program", &self.program);
        append_prefixed(&mut flat, "json", &self.json);
        flat.insert("memory_usage".to_string(), self.memory_usage().into());
        flat.insert(
            "captured_at".to_string(),
            self.captured_at.to_rfc3339().into(),
        );
        Value::Object(flat)
    }
}

fn append_prefixed(flat: &mut Map<String, Value>, prefix: &str, snapshot: &MetricsSnapshot) {
    let fields: [(&str, Value); 13] = [
        ("hits", snapshot.hits.into()),
        ("misses", snapshot.misses.into()),
        ("hit_ratio", snapshot.hit_ratio().into()),
        ("keys_added", snapshot.keys_added.into()),
        ("keys_updated", snapshot.keys_updated.into()),
        ("keys_evicted", snapshot.keys_evicted.into()),
        ("cost_added", snapshot.cost_added.into()),
        ("cost_evicted", snapshot.cost_evicted.into()),
        ("sets_dropped", snapshot.sets_dropped.into()),
        ("sets_rejected", snapshot.sets_rejected.into()),
        ("entries", snapshot.entries.into()),
        ("resident_cost", snapshot.resident_cost.into()),
        ("max_cost", snapshot.max_cost.into()),
    ];
    for (name, value) in fields {
        flat.insert(format!("{prefix}_{name}"), value);
    }
}
