use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use ria_contracts::content_hash;

use crate::provider::EmbeddingVector;

/// LRU cache keyed by the normalized-content hash, so repeated chunk text
/// across assessments skips the embedding call entirely.
pub struct EmbeddingCache {
    inner: Mutex<LruCache<String, EmbeddingVector>>,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity > 0");
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        }
    }

    pub fn get(&self, text: &str) -> Option<EmbeddingVector> {
        let key = content_hash(text);
        let mut cache = self.inner.lock();
        let hit = cache.get(&key).cloned();
        if hit.is_some() {
            *self.hits.lock() += 1;
        } else {
            *self.misses.lock() += 1;
        }
        hit
    }

    pub fn put(&self, text: &str, vector: EmbeddingVector) {
        let key = content_hash(text);
        self.inner.lock().put(key, vector);
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = *self.hits.lock() as f64;
        let misses = *self.misses.lock() as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_hits_on_repeated_content() {
        let cache = EmbeddingCache::new(10);
        assert!(cache.get("hello").is_none());
        cache.put("hello", vec![1.0, 2.0]);
        assert_eq!(cache.get("hello"), Some(vec![1.0, 2.0]));
        assert!(cache.hit_rate() > 0.0);
    }
}
