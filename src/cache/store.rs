//! Tagged TTL store.
//!
//! Entries live in a single map guarded by one lock together with the tag
//! index, so a key is never visible in one and missing from the other.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use metrics::counter;
use serde_json::Value;
use tracing::debug;

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::lock::RwLockExt;
use super::registry::TagIndex;
use crate::config::CacheSettings;

const METRIC_CACHE_HIT: &str = "skprod_cache_hit_total";
const METRIC_CACHE_MISS: &str = "skprod_cache_miss_total";
const METRIC_CACHE_EXPIRED: &str = "skprod_cache_expired_total";
const METRIC_CACHE_INVALIDATED: &str = "skprod_cache_invalidated_total";

/// A stored value with its lifetime and tags.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    /// Creation time in epoch milliseconds.
    pub timestamp_ms: i64,
    pub ttl: Duration,
    pub tags: HashSet<String>,
}

impl<V> CacheEntry<V> {
    /// An entry is live while `now - timestamp <= ttl`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.timestamp_ms) > ttl_ms
    }
}

/// Per-call options for [`TagCache::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Overrides the configured default TTL.
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    tags: TagIndex,
}

impl<V> CacheState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tags: TagIndex::new(),
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.tags.unregister(key);
        }
        removed
    }
}

/// In-process key/value store with per-entry TTL and tag invalidation.
///
/// Construct one per consumer scope and share it through an `Arc`; there is
/// no global instance.
pub struct TagCache<V = Value> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState<V>>,
}

impl<V: Clone> TagCache<V> {
    /// Create a cache backed by the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache from the validated `[cache]` settings.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(CacheConfig::from(settings))
    }

    /// Create a cache that reads time from `clock`.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: RwLock::new(CacheState::new()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store `data` under `key`, replacing any previous entry and its tags.
    pub fn set(&self, key: impl Into<String>, data: V, options: SetOptions) {
        let key = key.into();
        let tags: HashSet<String> = options.tags.into_iter().collect();
        let entry = CacheEntry {
            data,
            timestamp_ms: self.clock.now_millis(),
            ttl: options.ttl.unwrap_or_else(|| self.config.default_ttl()),
            tags: tags.clone(),
        };

        let mut state = self.state.write_or_recover("set");
        state.tags.register(&key, tags);
        state.entries.insert(key, entry);
    }

    /// Return the live value under `key`.
    ///
    /// An expired entry is evicted from both the store and the tag index.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();

        {
            let state = self.state.read_or_recover("get");
            match state.entries.get(key) {
                None => {
                    counter!(METRIC_CACHE_MISS).increment(1);
                    return None;
                }
                Some(entry) if !entry.is_expired(now) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    return Some(entry.data.clone());
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write_or_recover("get.evict");
        // Another writer may have replaced or removed the entry in between.
        match state.entries.get(key) {
            None => {
                counter!(METRIC_CACHE_MISS).increment(1);
                return None;
            }
            Some(entry) if !entry.is_expired(now) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                return Some(entry.data.clone());
            }
            Some(_) => {}
        }

        state.remove(key);
        counter!(METRIC_CACHE_EXPIRED).increment(1);
        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(key, "Evicted expired cache entry");
        None
    }

    /// Whether a live entry exists under `key`. Does not evict.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now_millis();
        self.state
            .read_or_recover("contains")
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remove `key` and detach it from its tags. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.state
            .write_or_recover("delete")
            .remove(key)
            .is_some()
    }

    /// Delete every entry carrying `tag` and drop the tag.
    ///
    /// Returns the number of entries removed; unknown tags remove nothing.
    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        let mut state = self.state.write_or_recover("invalidate_by_tag");
        let keys = state.tags.take_tag(tag);
        let removed = keys
            .iter()
            .filter(|key| state.entries.remove(key.as_str()).is_some())
            .count();
        drop(state);

        if removed > 0 {
            counter!(METRIC_CACHE_INVALIDATED).increment(removed as u64);
        }
        debug!(tag, removed, "Invalidated cache tag");
        removed
    }

    /// Sweep several tags in one call.
    pub fn invalidate_by_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .map(|tag| self.invalidate_by_tag(tag.as_ref()))
            .sum()
    }

    /// Empty the store and the tag index.
    pub fn clear(&self) {
        let mut state = self.state.write_or_recover("clear");
        state.entries.clear();
        state.tags.clear();
    }

    /// Evict every expired entry now rather than on next read.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut state = self.state.write_or_recover("purge_expired");
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        drop(state);

        if !expired.is_empty() {
            counter!(METRIC_CACHE_EXPIRED).increment(expired.len() as u64);
        }
        expired.len()
    }

    pub fn keys_for_tag(&self, tag: &str) -> HashSet<String> {
        self.state
            .read_or_recover("keys_for_tag")
            .tags
            .keys_for_tag(tag)
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.state.read_or_recover("len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tags currently indexed.
    pub fn tag_count(&self) -> usize {
        self.state.read_or_recover("tag_count").tags.tag_count()
    }

    /// Return the cached value, or run `fetch` once and cache its result.
    ///
    /// A failed fetch is returned unchanged and nothing is stored. Concurrent
    /// misses on the same key each run their own fetch.
    pub async fn with_cache<F, Fut, E>(
        &self,
        key: &str,
        fetch: F,
        options: SetOptions,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }

        let value = fetch().await?;
        self.set(key, value.clone(), options);
        Ok(value)
    }
}
