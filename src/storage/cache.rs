//! A byte-budgeted LRU page cache: LRU eviction driven by a running byte total
//! rather than entry count, with hit/miss/eviction metrics. No TTL, since pages
//! don't expire.

use crate::storage::page::Page;
use lru::LruCache;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time hit/miss counters, read without locking the cache itself.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

/// An LRU page cache bounded by approximate byte size rather than entry count,
/// since pages vary in size once multi-block entries are involved.
pub struct PageCache {
    store: Mutex<LruCache<u64, Page>>,
    capacity_bytes: usize,
    used_bytes: AtomicU64,
    pub metrics: CacheMetrics,
}

impl PageCache {
    #[must_use]
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            store: Mutex::new(LruCache::unbounded()),
            capacity_bytes,
            used_bytes: AtomicU64::new(0),
            metrics: CacheMetrics::default(),
        }
    }

    #[must_use]
    pub fn get(&self, page_id: u64) -> Option<Page> {
        let mut store = self.store.lock();
        let found = store.get(&page_id).cloned();
        if found.is_some() {
            self.metrics.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, page: Page) {
        let mut store = self.store.lock();
        let incoming_size = page.body.len() as u64;
        if let Some(evicted) = store.push(page.header.page_id, page) {
            self.used_bytes.fetch_sub(evicted.1.body.len() as u64, Ordering::Relaxed);
        }
        self.used_bytes.fetch_add(incoming_size, Ordering::Relaxed);

        while self.used_bytes.load(Ordering::Relaxed) > self.capacity_bytes as u64 {
            let Some((_, evicted)) = store.pop_lru() else { break };
            self.used_bytes.fetch_sub(evicted.body.len() as u64, Ordering::Relaxed);
            self.metrics.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn invalidate(&self, page_id: u64) {
        let mut store = self.store.lock();
        if let Some(removed) = store.pop(&page_id) {
            self.used_bytes.fetch_sub(removed.body.len() as u64, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::split_into_blocks;

    fn page(id: u64, size: usize) -> Page {
        Page::new(id, 1, &split_into_blocks(&vec![0u8; size], size.max(1)))
    }

    #[test]
    fn hit_and_miss_are_tracked() {
        let cache = PageCache::new(1024);
        cache.insert(page(1, 10));
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
        assert_eq!(cache.metrics.hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.metrics.misses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn inserts_beyond_capacity_evict_least_recently_used() {
        let cache = PageCache::new(30);
        cache.insert(page(1, 20));
        cache.insert(page(2, 20));
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
        assert_eq!(cache.metrics.evictions.load(Ordering::Relaxed), 1);
    }
}
