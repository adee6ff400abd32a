use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Identifies one cached rendering: the request target plus who was looking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path_and_query: String,
    pub viewer: Option<i64>,
}

impl CacheKey {
    pub fn new(path_and_query: impl Into<String>, viewer: Option<i64>) -> Self {
        Self {
            path_and_query: path_and_query.into(),
            viewer,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPage {
    body: String,
    expires_at: Instant,
}

/// Whole-page cache for rendered HTML. Entries live until their TTL runs
/// out or until `clear` is called; nothing else invalidates them.
pub struct PageCache {
    ttl: Duration,
    pages: HashMap<CacheKey, CachedPage>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pages: HashMap::new(),
        }
    }

    /// Return the cached body for `key` if it has not expired.
    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        let page = self.pages.get(key)?;
        if Instant::now() >= page.expires_at {
            tracing::debug!("Cache entry for {} expired", key.path_and_query);
            self.pages.remove(key);
            return None;
        }
        Some(page.body.clone())
    }

    pub fn insert(&mut self, key: CacheKey, body: String) {
        self.clear_stale();
        self.pages.insert(
            key,
            CachedPage {
                body,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        tracing::info!("Clearing {} cached page(s)", self.pages.len());
        self.pages.clear();
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn clear_stale(&mut self) {
        let now = Instant::now();
        self.pages.retain(|_, page| now < page.expires_at);
    }
}
