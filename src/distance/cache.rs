use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::utils::ordered_pair;

/// Bounded cache of pairwise distances, keyed by the unordered pair.
pub struct PairCache {
    cache: Mutex<LruCache<(String, String), f64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
}

impl PairCache {
    /// `None` for a zero capacity.
    pub fn new(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(|capacity| Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn key(a: &str, b: &str) -> (String, String) {
        let (first, second) = ordered_pair(a, b);
        (first.to_string(), second.to_string())
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let mut cache = self.cache.lock();
        match cache.get(&Self::key(a, b)) {
            Some(distance) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(*distance)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, a: &str, b: &str, distance: f64) {
        self.cache.lock().put(Self::key(a, b), distance);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 { hits as f64 / total as f64 } else { 0.0 };

        CacheStats {
            hits,
            misses,
            size: self.cache.lock().len(),
            hit_rate,
        }
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
