//! Page cache with a fixed time-to-live

use crate::{CacheConfig, Clock, PageKey, PageRequest, SharedClock, SystemClock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A fetched page.
///
/// Entries are immutable once stored; refreshing a page replaces the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Page the body belongs to
    pub key: PageKey,
    /// Parsed response body
    pub body: Value,
    /// Title supplied by a `receive` listener, if any
    pub title: Option<String>,
    /// Request that produced the body
    pub request: PageRequest,
    /// Completion instant of the fetch
    pub fetched_at: Instant,
}

impl CacheEntry {
    /// Create an entry stamped at `fetched_at`
    pub fn new(key: PageKey, body: Value, fetched_at: Instant) -> Self {
        let request = PageRequest::from(&key);
        Self {
            key,
            body,
            title: None,
            request,
            fetched_at,
        }
    }

    /// With title
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// With the request actually issued
    pub fn with_request(mut self, request: PageRequest) -> Self {
        self.request = request;
        self
    }

    /// Age of the entry at `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    /// Whether the entry is still servable under `ttl`
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Stored entries, stale ones included
    pub entries: usize,
    /// Lookups answered with a fresh entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Lookups that found only a stale entry
    pub expired: u64,
}

impl CacheStats {
    /// Hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.expired;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Keyed store of fetched pages.
///
/// Freshness is never stored: every query compares the entry's age against
/// the TTL using the injected clock. Stale entries stay visible through
/// [`PageCache::get`] until purged.
pub struct PageCache {
    ttl: Duration,
    clock: SharedClock,
    entries: HashMap<PageKey, CacheEntry>,
    stats: CacheStats,
}

impl PageCache {
    /// Create a cache on the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache on a custom clock
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        Self {
            ttl: config.ttl,
            clock,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current instant according to the cache clock
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Store a body stamped with the current time, replacing any entry
    pub fn put(&mut self, key: PageKey, body: Value) -> &CacheEntry {
        let entry = CacheEntry::new(key, body, self.clock.now());
        self.insert(entry)
    }

    /// Store a prepared entry, replacing any entry for the same key
    pub fn insert(&mut self, entry: CacheEntry) -> &CacheEntry {
        debug!("Caching {}", entry.key);
        let key = entry.key.clone();
        self.entries.insert(key.clone(), entry);
        &self.entries[&key]
    }

    /// Whether a fresh entry exists for `key`
    pub fn is_valid(&self, key: &PageKey) -> bool {
        let now = self.clock.now();
        self.entries
            .get(key)
            .map(|e| e.is_fresh(now, self.ttl))
            .unwrap_or(false)
    }

    /// Raw entry, fresh or stale
    pub fn get(&self, key: &PageKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    /// Fresh entry only
    pub fn get_valid(&self, key: &PageKey) -> Option<&CacheEntry> {
        let now = self.clock.now();
        self.entries.get(key).filter(|e| e.is_fresh(now, self.ttl))
    }

    /// Fresh entry only, recording the outcome in the statistics
    pub fn lookup(&mut self, key: &PageKey) -> Option<&CacheEntry> {
        let now = self.clock.now();
        match self.entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl) => {
                self.stats.hits += 1;
                Some(entry)
            }
            Some(_) => {
                self.stats.expired += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Remove one entry; no-op if absent
    pub fn purge(&mut self, key: &PageKey) {
        if self.entries.remove(key).is_some() {
            debug!("Purged {}", key);
        }
    }

    /// Remove every entry
    pub fn purge_all(&mut self) {
        let count = self.entries.len();
        self.entries.clear();
        debug!("Purged {} cached pages", count);
    }

    /// Number of stored entries, stale ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats.clone()
        }
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .finish()
    }
}
