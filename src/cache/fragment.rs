//! Rendered HTML fragments cached by name and vary-on values.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use lru::LruCache;
use metrics::counter;

use super::config::FragmentCacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::fragment";

pub const HIT_TOTAL: &str = "yatube_fragment_cache_hit_total";
pub const MISS_TOTAL: &str = "yatube_fragment_cache_miss_total";
pub const EVICT_TOTAL: &str = "yatube_fragment_cache_evict_total";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FragmentKey {
    name: String,
    vary_on: Vec<String>,
}

impl FragmentKey {
    fn new(name: &str, vary_on: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            vary_on: vary_on.iter().map(|value| (*value).to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedFragment {
    html: Arc<str>,
    expires_at: Instant,
}

/// In-process fragment store with per-entry expiry and LRU eviction.
///
/// Entries are served unchanged until they expire or are invalidated, even if
/// the underlying data changed in the meantime.
pub struct FragmentCache {
    config: FragmentCacheConfig,
    entries: Mutex<LruCache<FragmentKey, CachedFragment>>,
}

impl FragmentCache {
    pub fn new(config: FragmentCacheConfig) -> Self {
        let entries = Mutex::new(LruCache::new(config.limit));
        Self { config, entries }
    }

    pub fn disabled() -> Self {
        Self::new(FragmentCacheConfig {
            enabled: false,
            ..Default::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn get(&self, name: &str, vary_on: &[&str]) -> Option<Arc<str>> {
        self.get_at(name, vary_on, Instant::now())
    }

    pub fn put(&self, name: &str, vary_on: &[&str], html: impl Into<Arc<str>>) {
        self.put_at(name, vary_on, html.into(), Instant::now());
    }

    /// Drop every variant stored under `name`. Returns how many were removed.
    pub fn invalidate(&self, name: &str) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "invalidate");
        let stale: Vec<FragmentKey> = entries
            .iter()
            .filter(|(key, _)| key.name == name)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        stale.len()
    }

    pub fn invalidate_entry(&self, name: &str, vary_on: &[&str]) -> bool {
        let key = FragmentKey::new(name, vary_on);
        mutex_lock(&self.entries, SOURCE, "invalidate_entry")
            .pop(&key)
            .is_some()
    }

    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, name: &str, vary_on: &[&str], now: Instant) -> Option<Arc<str>> {
        if !self.config.enabled {
            return None;
        }

        let key = FragmentKey::new(name, vary_on);
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let fresh = match entries.get(&key) {
            Some(entry) if entry.expires_at > now => Some(entry.html.clone()),
            Some(_) => {
                entries.pop(&key);
                None
            }
            None => None,
        };
        drop(entries);

        match fresh {
            Some(html) => {
                counter!(HIT_TOTAL, "fragment" => name.to_string()).increment(1);
                Some(html)
            }
            None => {
                counter!(MISS_TOTAL, "fragment" => name.to_string()).increment(1);
                None
            }
        }
    }

    fn put_at(&self, name: &str, vary_on: &[&str], html: Arc<str>, now: Instant) {
        if !self.config.enabled {
            return;
        }

        let key = FragmentKey::new(name, vary_on);
        let entry = CachedFragment {
            html,
            expires_at: now + self.config.ttl,
        };
        let evicted = mutex_lock(&self.entries, SOURCE, "put")
            .push(key.clone(), entry)
            .filter(|(evicted_key, _)| *evicted_key != key);
        if evicted.is_some() {
            counter!(EVICT_TOTAL, "fragment" => name.to_string()).increment(1);
        }
    }
}
