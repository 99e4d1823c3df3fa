//! Cost-aware caches for compiled programs and parsed documents.
//!
//! [`CostCache`] bounds memory by the summed cost of its entries rather than
//! by entry count. New entries are admitted only when they are accessed more
//! often than the residents they would displace (moka's TinyLFU policy).

mod cost;
mod metrics;
mod report;

pub use cost::{CostCache, CostCacheConfig};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use report::CacheReport;
