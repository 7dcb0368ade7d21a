//! Bounded LRU cache for match responses.
//!
//! Keys are the normalized query plus every parameter that changes the
//! response, so two raw spellings that normalize the same share an entry.
//! Float parameters are keyed by bit pattern (with `-0.0` folded into `0.0`).
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::matching::MatchError;

/// Default number of cached responses.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

fn float_key(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

/// Everything that determines a match response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query_norm: String,
    threshold: u64,
    limit: usize,
    w_token: u64,
    explain: bool,
    include_by_id: bool,
}

impl CacheKey {
    pub fn new(
        query_norm: &str,
        threshold: f64,
        limit: usize,
        w_token: f64,
        explain: bool,
        include_by_id: bool,
    ) -> Self {
        Self {
            query_norm: query_norm.to_string(),
            threshold: float_key(threshold),
            limit,
            w_token: float_key(w_token),
            explain,
            include_by_id,
        }
    }
}

/// Thread-safe LRU of shared responses. A hit promotes the entry; inserting
/// past capacity evicts the least recently used one.
pub struct QueryCache<V> {
    inner: Mutex<LruCache<CacheKey, Arc<V>>>,
    capacity: usize,
}

impl<V> QueryCache<V> {
    pub fn new(capacity: usize) -> Result<Self, MatchError> {
        let cap = NonZeroUsize::new(capacity).ok_or_else(|| {
            MatchError::InvalidArgument("cache capacity must be > 0".to_string())
        })?;
        Ok(Self {
            inner: Mutex::new(LruCache::new(cap)),
            capacity,
        })
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        self.inner.lock().get(key).cloned()
    }

    pub fn set(&self, key: CacheKey, value: Arc<V>) {
        self.inner.lock().put(key, value);
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
