use crate::core::models::Classification;
use crate::infrastructure::processors::classify;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Content-addressed classification cache. Classification depends on the
/// text only, so the BLAKE3 digest of the source is a complete key.
#[derive(Default)]
pub struct ClassificationCache {
    entries: DashMap<blake3::Hash, Classification>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

impl ClassificationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, source: &str) -> Classification {
        let key = blake3::hash(source.as_bytes());

        if let Some(cached) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached.clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let classification = classify(source);
        self.entries.insert(key, classification.clone());
        classification
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
