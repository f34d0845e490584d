//! Response caching for provider adapters.
//!
//! [`CachingProvider`] wraps another adapter and memoizes its successful
//! answers by normalized query, so repeated questions skip the upstream
//! call. Failures are never cached. The cache is private to the wrapper and
//! invisible to the orchestrator.

use super::{ProviderAdapter, ProviderFuture};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::trace;

/// Default number of cached answers per provider.
pub const DEFAULT_CACHE_ENTRIES: usize = 128;

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    /// Insertion sequence number, for oldest-first eviction.
    seq: u64,
}

/// Bounded query → answer cache with hit/miss counters.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<u64, CacheEntry>,
    max_entries: usize,
    next_seq: u64,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
            next_seq: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a cached answer.
    pub fn get(&mut self, query: &str) -> Option<&str> {
        if let Some(entry) = self.entries.get(&hash_query(query)) {
            self.hits += 1;
            Some(&entry.text)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Store an answer, evicting the oldest entry when full.
    pub fn put(&mut self, query: &str, text: String) {
        if self.max_entries == 0 {
            return;
        }
        let key = hash_query(query);
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.evict_oldest();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, CacheEntry { text, seq });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, v)| v.seq)
            .map(|(k, _)| *k)
        {
            self.entries.remove(&oldest);
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

/// FNV-1a over the lowercased, whitespace-collapsed query.
fn hash_query(query: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    let mut first = true;
    for word in query.split_whitespace() {
        if !first {
            hash ^= u64::from(b' ');
            hash = hash.wrapping_mul(0x100000001b3);
        }
        first = false;
        for byte in word.bytes() {
            hash ^= u64::from(byte.to_ascii_lowercase());
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

/// Memoizes the successful answers of an inner adapter.
///
/// Reports the inner adapter's name, so a cached answer is attributed to the
/// source that originally produced it.
#[derive(Debug)]
pub struct CachingProvider<P> {
    inner: P,
    cache: Mutex<ResponseCache>,
}

impl<P: ProviderAdapter> CachingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_capacity(inner, DEFAULT_CACHE_ENTRIES)
    }

    pub fn with_capacity(inner: P, max_entries: usize) -> Self {
        Self {
            inner,
            cache: Mutex::new(ResponseCache::new(max_entries)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// `(hits, misses)` so far.
    pub fn stats(&self) -> (u64, u64) {
        match self.cache.lock() {
            Ok(cache) => (cache.hits(), cache.misses()),
            Err(_) => (0, 0),
        }
    }

    fn cached(&self, query: &str) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(query).map(str::to_string)
    }

    fn remember(&self, query: &str, text: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(query, text.to_string());
        }
    }
}

impl<P: ProviderAdapter> ProviderAdapter for CachingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn attempt<'a>(&'a self, query: &'a str) -> ProviderFuture<'a> {
        Box::pin(async move {
            if let Some(text) = self.cached(query) {
                trace!("Cache hit for provider '{}'", self.inner.name());
                return Ok(text);
            }
            let result = self.inner.attempt(query).await;
            if let Ok(text) = &result {
                self.remember(query, text);
            }
            result
        })
    }
}
