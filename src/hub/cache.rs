use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::types::Classification;

/// Default lifetime of a memoized match
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Default number of memoized matches
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Cache key: (tag, name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    tag: String,
    name: String,
}

/// Memoized positive match results.
///
/// Only hits are stored, keyed by (tag, name), with the matcher kind that
/// fired. A miss says nothing about whether the pair matches. Entries expire
/// after the TTL and are also evicted least-recently-used at capacity.
pub struct MatchCache {
    entries: Mutex<LruCache<MatchKey, (Classification, Instant)>>,
    ttl: Duration,
}

impl MatchCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Look up a live entry; expired entries are dropped on access
    pub fn get(&self, tag: &str, name: &str) -> Option<Classification> {
        let key = MatchKey {
            tag: tag.to_string(),
            name: name.to_string(),
        };
        let mut entries = self.entries.lock();
        let (kind, at) = *entries.get(&key)?;
        if at.elapsed() < self.ttl {
            return Some(kind);
        }
        entries.pop(&key);
        None
    }

    pub fn insert(&self, tag: &str, name: &str, kind: Classification) {
        let key = MatchKey {
            tag: tag.to_string(),
            name: name.to_string(),
        };
        self.entries.lock().put(key, (kind, Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}
