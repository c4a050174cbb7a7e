//! Bounded LRU cache for extracted content
//!
//! Keys are either page URLs or composite search keys; values are the
//! final, format-selected content strings. A hit short-circuits all
//! render and network work for that key.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Default cache capacity (entries)
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Least-recently-used content cache
///
/// The mutex is held only for the duration of a single map operation;
/// concurrent identical-key writes resolve as last-writer-wins.
pub struct ContentCache {
    entries: Mutex<LruCache<String, String>>,
}

impl ContentCache {
    /// Create a cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a key, promoting it to most-recently-used on a hit
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Insert or overwrite an entry, evicting the least-recently-used
    /// one under capacity pressure
    pub fn put(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(key.to_string(), value.to_string());
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.len()
    }

    /// True when the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Composite key for memoized search results
    pub fn search_key(query: &str, max_results: usize) -> String {
        format!("search:{query},max_results={max_results}")
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put() {
        let cache = ContentCache::new(4);
        assert!(cache.get("https://example.com").is_none());
        cache.put("https://example.com", "# Example");
        assert_eq!(
            cache.get("https://example.com"),
            Some("# Example".to_string())
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ContentCache::new(2);
        cache.put("a", "1");
        cache.put("b", "2");
        // Touch "a" so "b" becomes the eviction candidate
        assert!(cache.get("a").is_some());
        cache.put("c", "3");
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = ContentCache::new(4);
        cache.put("k", "first");
        cache.put("k", "second");
        assert_eq!(cache.get("k"), Some("second".to_string()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_search_key_format() {
        assert_eq!(
            ContentCache::search_key("openai", 3),
            "search:openai,max_results=3"
        );
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = ContentCache::new(0);
        cache.put("k", "v");
        assert_eq!(cache.get("k"), Some("v".to_string()));
    }
}
