//! Match counters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::types::Classification;

/// Metric name: DNS queries seen
pub const METRIC_DNS_QUERY: &str = "dnsquery";
/// Metric name: ECS substitutions served
pub const METRIC_ECS_HITS: &str = "ecshits";
/// Metric name: NXDOMAIN answers
pub const METRIC_NXDOMAIN: &str = "nxdomain";

/// Receiver of match statistics. Implementations must never block the
/// caller for long or fail.
pub trait StatsSink: Send + Sync {
    fn increment(&self, classification: Classification, name: &str, delta: u64);
}

/// Snapshot of one counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Counter {
    pub name: String,
    pub value: u64,
}

type CounterMap = RwLock<HashMap<String, Arc<AtomicU64>>>;

/// In-process counters, one namespace per [`Classification`].
///
/// Existing counters are bumped under a read lock with an atomic add; the
/// write lock is only taken the first time a name is seen.
#[derive(Debug, Default)]
pub struct CounterStats {
    domain: CounterMap,
    keyword: CounterMap,
    network: CounterMap,
    metrics: CounterMap,
}

impl CounterStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, classification: Classification) -> &CounterMap {
        match classification {
            Classification::Domain => &self.domain,
            Classification::Keyword => &self.keyword,
            Classification::Network => &self.network,
            Classification::Metrics => &self.metrics,
        }
    }

    /// Current value, 0 for an unknown name
    pub fn value(&self, classification: Classification, name: &str) -> u64 {
        self.map(classification)
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// All counters of one classification, largest first
    pub fn values(&self, classification: Classification) -> Vec<Counter> {
        let mut out: Vec<Counter> = self
            .map(classification)
            .read()
            .iter()
            .map(|(name, c)| Counter {
                name: name.clone(),
                value: c.load(Ordering::Relaxed),
            })
            .collect();
        out.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
        out
    }

    pub fn reset(&self, classification: Classification) {
        self.map(classification).write().clear();
    }
}

impl StatsSink for CounterStats {
    fn increment(&self, classification: Classification, name: &str, delta: u64) {
        let map = self.map(classification);
        if let Some(counter) = map.read().get(name) {
            counter.fetch_add(delta, Ordering::Relaxed);
            return;
        }
        map.write()
            .entry(name.to_string())
            .or_default()
            .fetch_add(delta, Ordering::Relaxed);
    }
}
