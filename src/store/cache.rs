//! In-memory caches: the bookmark recency cache and the TTL-based
//! search-result cache.

use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use crate::domain::Bookmark;

/// Bounded map of the most-recently-added/updated bookmarks, serving hot
/// reads without a database round-trip. Never persisted.
pub(super) struct RecencyCache {
    inner: Mutex<LruCache<String, Bookmark>>,
    capacity: usize,
}

impl RecencyCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).expect("capacity is at least 1"),
            )),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Cache hit promotes the entry.
    pub fn get(&self, id: &str) -> Option<Bookmark> {
        self.inner.lock().get(id).cloned()
    }

    pub fn put(&self, bookmark: &Bookmark) {
        self.inner
            .lock()
            .put(bookmark.id.clone(), bookmark.clone());
    }

    /// Inserts a batch, keeping only the newest `capacity` entries of the
    /// batch and inserting oldest-first so the newest end up hottest.
    pub fn put_batch(&self, bookmarks: &[Bookmark]) {
        let mut newest: Vec<&Bookmark> = bookmarks.iter().collect();
        newest.sort_by(|a, b| b.date_added.cmp(&a.date_added));
        newest.truncate(self.capacity);

        let mut inner = self.inner.lock();
        for bookmark in newest.into_iter().rev() {
            inner.put(bookmark.id.clone(), bookmark.clone());
        }
    }

    pub fn remove(&self, id: &str) {
        self.inner.lock().pop(id);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Serves a page ordered by `date_added` descending when the cache
    /// holds enough entries to cover it; `None` sends the caller to the
    /// database.
    pub fn recent_page(&self, limit: usize, offset: usize) -> Option<Vec<Bookmark>> {
        let inner = self.inner.lock();
        if inner.len() < offset + limit {
            return None;
        }
        let mut all: Vec<Bookmark> = inner.iter().map(|(_, b)| b.clone()).collect();
        all.sort_by(|a, b| b.date_added.cmp(&a.date_added));
        Some(all.into_iter().skip(offset).take(limit).collect())
    }
}

/// Cached search results with a coarse TTL. Cleared in full on any write —
/// correctness over precision.
pub(super) struct SearchCache {
    inner: Mutex<HashMap<String, CachedResults>>,
    ttl: Duration,
}

struct CachedResults {
    results: Vec<Bookmark>,
    at: Instant,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<Bookmark>> {
        let mut inner = self.inner.lock();
        match inner.get(key) {
            Some(cached) if cached.at.elapsed() < self.ttl => Some(cached.results.clone()),
            Some(_) => {
                inner.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, results: Vec<Bookmark>) {
        self.inner.lock().insert(
            key,
            CachedResults {
                results,
                at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(id: &str, date_added: i64) -> Bookmark {
        let mut b = Bookmark::new(format!("title {id}"), None);
        b.id = id.to_string();
        b.date_added = date_added;
        b
    }

    #[test]
    fn recency_cache_evicts_least_recent() {
        let cache = RecencyCache::new(2);
        cache.put(&bookmark("a", 1));
        cache.put(&bookmark("b", 2));
        cache.put(&bookmark("c", 3));

        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn put_batch_keeps_only_newest_entries() {
        let cache = RecencyCache::new(3);
        let batch: Vec<Bookmark> = (0..10).map(|i| bookmark(&format!("b{i}"), i)).collect();
        cache.put_batch(&batch);

        assert_eq!(cache.len(), 3);
        assert!(cache.get("b9").is_some());
        assert!(cache.get("b7").is_some());
        assert!(cache.get("b0").is_none());
    }

    #[test]
    fn recent_page_orders_by_date_added_descending() {
        let cache = RecencyCache::new(10);
        for i in 0..6 {
            cache.put(&bookmark(&format!("b{i}"), i));
        }
        let page = cache.recent_page(3, 1).unwrap();
        let ids: Vec<&str> = page.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b4", "b3", "b2"]);
    }

    #[test]
    fn recent_page_declines_when_short() {
        let cache = RecencyCache::new(10);
        cache.put(&bookmark("a", 1));
        assert!(cache.recent_page(5, 0).is_none());
        assert!(cache.recent_page(1, 1).is_none());
        assert!(cache.recent_page(1, 0).is_some());
    }

    #[test]
    fn search_cache_round_trips_within_ttl() {
        let cache = SearchCache::new(Duration::from_secs(60));
        cache.put("k".into(), vec![bookmark("a", 1)]);
        assert_eq!(cache.get("k").unwrap().len(), 1);
    }

    #[test]
    fn search_cache_expires_entries() {
        let cache = SearchCache::new(Duration::ZERO);
        cache.put("k".into(), vec![bookmark("a", 1)]);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn search_cache_clear_drops_everything() {
        let cache = SearchCache::new(Duration::from_secs(60));
        cache.put("a".into(), vec![]);
        cache.put("b".into(), vec![]);
        cache.clear();
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_none());
    }
}
