use std::time::Duration;

use moka::sync::Cache;

/// Per-symbol memo of resolved dividend yields. Entries are written once and
/// read many times; a racing duplicate write stores the same value.
pub trait YieldCache: Send + Sync {
    fn get(&self, symbol: &str) -> Option<f64>;
    fn insert(&self, symbol: &str, value: f64);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachePolicy {
    pub max_capacity: u64,
    pub time_to_live: Option<Duration>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            time_to_live: None,
        }
    }
}

pub struct MokaYieldCache {
    inner: Cache<String, f64>,
}

impl MokaYieldCache {
    pub fn new(policy: CachePolicy) -> Self {
        let mut builder = Cache::builder().max_capacity(policy.max_capacity);
        if let Some(ttl) = policy.time_to_live {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
        }
    }
}

impl Default for MokaYieldCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl YieldCache for MokaYieldCache {
    fn get(&self, symbol: &str) -> Option<f64> {
        self.inner.get(symbol)
    }

    fn insert(&self, symbol: &str, value: f64) {
        self.inner.insert(symbol.to_string(), value);
    }
}
