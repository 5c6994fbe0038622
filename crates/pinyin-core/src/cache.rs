//! Bounded LRU cache of whole-text conversion results.
//!
//! Keys carry the input text plus every option that affects the output,
//! so identical text converted with different options never collides.
//! Entries are never invalidated by tier migrations; they age out under
//! LRU pressure or the optional TTL sweep.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::convert::ConvertOptions;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
    options: ConvertOptions,
}

impl CacheKey {
    pub fn new(text: &str, options: &ConvertOptions) -> Self {
        Self {
            text: text.to_string(),
            options: options.clone(),
        }
    }
}

struct CachedValue {
    value: String,
    stored_at: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

pub struct ResultCache {
    entries: LruCache<CacheKey, CachedValue>,
    ttl_secs: u64,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    /// `ttl_secs == 0` disables expiry.
    pub fn new(capacity: NonZeroUsize, ttl_secs: u64) -> Self {
        Self {
            entries: LruCache::new(capacity),
            ttl_secs,
            hits: 0,
            misses: 0,
        }
    }

    fn expired(&self, stored_at: u64, now: u64) -> bool {
        self.ttl_secs > 0 && now.saturating_sub(stored_at) >= self.ttl_secs
    }

    /// Look up and mark as most recently used. Expired entries count as misses.
    pub fn get(&mut self, key: &CacheKey, now: u64) -> Option<String> {
        let stored_at = self.entries.peek(key).map(|v| v.stored_at);
        match stored_at {
            Some(t) if self.expired(t, now) => {
                self.entries.pop(key);
                self.misses += 1;
                None
            }
            Some(_) => {
                self.hits += 1;
                self.entries.get(key).map(|v| v.value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert, evicting the least recently used entry when full.
    pub fn put(&mut self, key: CacheKey, value: String, now: u64) {
        self.entries.put(
            key,
            CachedValue {
                value,
                stored_at: now,
            },
        );
    }

    /// Return the cached value or compute, store, and return it. `compute`
    /// runs with the cache borrowed; callers sharing the cache behind a
    /// lock should use `get` and `put` around the work instead.
    pub fn get_or_compute(
        &mut self,
        key: CacheKey,
        now: u64,
        compute: impl FnOnce() -> String,
    ) -> String {
        if let Some(hit) = self.get(&key, now) {
            return hit;
        }
        let value = compute();
        self.put(key, value.clone(), now);
        value
    }

    /// Drop every entry older than the TTL. Returns how many were dropped.
    pub fn sweep_expired(&mut self, now: u64) -> usize {
        if self.ttl_secs == 0 {
            return 0;
        }
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, v)| self.expired(v.stored_at, now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &stale {
            self.entries.pop(k);
        }
        stale.len()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            len: self.entries.len(),
        }
    }
}
