//! Bounded, time-boxed storage of rendered responses.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;
use tracing::warn;

use super::config::CacheConfig;

/// Route plus query string plus viewer identity; anonymous viewers share entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey {
    pub path: String,
    pub query: String,
    pub viewer: Option<String>,
}

impl ResponseKey {
    pub fn new(path: impl Into<String>, query: impl Into<String>, viewer: Option<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
            viewer,
        }
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

struct Entry {
    stored_at: Instant,
    response: CachedResponse,
}

pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<LruCache<ResponseKey, Entry>>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            entries: Mutex::new(LruCache::new(config.max_entries)),
        }
    }

    /// Locks the entries, reusing the guard of a poisoned lock.
    fn entries(&self, op: &'static str) -> MutexGuard<'_, LruCache<ResponseKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(
                target = "postern::cache::store",
                op,
                "recovered from poisoned response cache lock"
            );
            poisoned.into_inner()
        })
    }

    pub fn get(&self, key: &ResponseKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &ResponseKey, now: Instant) -> Option<CachedResponse> {
        let mut entries = self.entries("get");
        let fresh = match entries.get(key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) < self.ttl,
            None => {
                counter!("postern_cache_misses_total").increment(1);
                return None;
            }
        };

        if fresh {
            counter!("postern_cache_hits_total").increment(1);
            entries.get(key).map(|entry| entry.response.clone())
        } else {
            entries.pop(key);
            counter!("postern_cache_expired_total").increment(1);
            counter!("postern_cache_misses_total").increment(1);
            None
        }
    }

    pub fn insert(&self, key: ResponseKey, response: CachedResponse) {
        self.insert_at(key, response, Instant::now());
    }

    pub(crate) fn insert_at(&self, key: ResponseKey, response: CachedResponse, now: Instant) {
        let entry = Entry {
            stored_at: now,
            response,
        };
        let evicted = self.entries("insert").push(key.clone(), entry);
        if matches!(evicted, Some((evicted_key, _)) if evicted_key != key) {
            counter!("postern_cache_evictions_total").increment(1);
        }
    }

    /// Drops every stored response.
    pub fn clear(&self) {
        self.entries("clear").clear();
    }

    pub fn len(&self) -> usize {
        self.entries("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
