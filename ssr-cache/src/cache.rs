//! Keyed LRU+TTL cache for rendered SSR output (spec §4.7, C7).
//!
//! Recency order is modeled as insertion order in an [`IndexMap`]: a touch
//! (`get` hit, or `set`) removes and re-inserts the entry so it lands at the
//! end, and eviction always takes the front. `has` performs the same TTL
//! check as `get` but never reorders, matching spec §4.7 verbatim.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{SsrCacheError, SsrCacheResult};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone)]
pub struct SsrCacheConfig {
    pub max_size: usize,
    pub ttl_ms: u64,
    pub use_content_hash: bool,
}

impl Default for SsrCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            ttl_ms: 5 * 60 * 1000,
            use_content_hash: true,
        }
    }
}

/// Cache entry (spec §3 "SSR Cache Entry"). `insertion_timestamp`/`hit_count`
/// are bookkeeping the cache itself maintains; callers supply everything
/// else via [`SsrCache::set`].
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub html: String,
    pub css: String,
    pub head: String,
    pub content_hash: Option<String>,
    pub insertion_timestamp: u64,
    pub hit_count: u64,
}

impl CacheEntry {
    pub fn new(html: String, css: String, head: String, content_hash: Option<String>) -> Self {
        Self {
            html,
            css,
            head,
            content_hash,
            insertion_timestamp: now_ms(),
            hit_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub oldest_ts: Option<u64>,
    pub newest_ts: Option<u64>,
}

/// Either a regex source string or an already-compiled [`Regex`] (spec §9
/// Open Questions: strings are compiled as if they were regex sources).
pub enum InvalidationPattern<'a> {
    Source(&'a str),
    Compiled(&'a Regex),
}

impl<'a> From<&'a str> for InvalidationPattern<'a> {
    fn from(value: &'a str) -> Self {
        InvalidationPattern::Source(value)
    }
}

impl<'a> From<&'a Regex> for InvalidationPattern<'a> {
    fn from(value: &'a Regex) -> Self {
        InvalidationPattern::Compiled(value)
    }
}

impl<'a> InvalidationPattern<'a> {
    fn compiled(&self) -> SsrCacheResult<std::borrow::Cow<'_, Regex>> {
        match self {
            InvalidationPattern::Compiled(r) => Ok(std::borrow::Cow::Borrowed(*r)),
            InvalidationPattern::Source(s) => Regex::new(s)
                .map(std::borrow::Cow::Owned)
                .map_err(|e| SsrCacheError::InvalidPattern(s.to_string(), e.to_string())),
        }
    }
}

/// LRU+TTL cache keyed by the strings `hash::generate_key` produces (spec
/// §4.7). Consumers always receive owned copies of entries; the map itself
/// is the single owner.
pub struct SsrCache {
    config: SsrCacheConfig,
    entries: IndexMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl SsrCache {
    pub fn new(config: SsrCacheConfig) -> Self {
        Self {
            config,
            entries: IndexMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        self.config.ttl_ms != 0 && now_ms().saturating_sub(entry.insertion_timestamp) > self.config.ttl_ms
    }

    /// `get(key)` (spec §4.7): absent, expired, or present-and-touched.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        let expired = match self.entries.get(key) {
            None => {
                self.misses += 1;
                return None;
            }
            Some(entry) => self.is_expired(entry),
        };
        if expired {
            self.entries.shift_remove(key);
            self.misses += 1;
            return None;
        }
        self.hits += 1;
        let mut entry = self.entries.shift_remove(key).expect("checked above");
        entry.hit_count += 1;
        self.entries.insert(key.to_string(), entry.clone());
        Some(entry)
    }

    /// `has(key)` observes TTL but never reorders and never touches the
    /// hit/miss counters (spec §4.7).
    pub fn has(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) => !self.is_expired(entry),
            None => false,
        }
    }

    /// `set(key, entry)`: evicts least-recent while at capacity, then
    /// inserts as most-recent.
    pub fn set(&mut self, key: String, entry: CacheEntry) {
        self.entries.shift_remove(&key);
        while self.entries.len() >= self.config.max_size.max(1) && !self.entries.is_empty() {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, entry);
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn invalidate_pattern<'a>(
        &mut self,
        pattern: impl Into<InvalidationPattern<'a>>,
    ) -> SsrCacheResult<usize> {
        let pattern = pattern.into();
        let regex = pattern.compiled()?;
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| regex.is_match(k))
            .cloned()
            .collect();
        for key in &doomed {
            self.entries.shift_remove(key);
        }
        Ok(doomed.len())
    }

    /// Deletes keys whose prefix is `path + ":"`, escaping `path` so it is
    /// matched literally rather than as a pattern.
    pub fn invalidate_component(&mut self, path: &str) -> usize {
        let prefix = format!("{path}:");
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        for key in &doomed {
            self.entries.shift_remove(key);
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.hits + self.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        };
        CacheStats {
            size: self.entries.len(),
            max_size: self.config.max_size,
            hits: self.hits,
            misses: self.misses,
            hit_rate,
            oldest_ts: self.entries.values().next().map(|e| e.insertion_timestamp),
            newest_ts: self.entries.values().last().map(|e| e.insertion_timestamp),
        }
    }

    pub fn config(&self) -> &SsrCacheConfig {
        &self.config
    }
}

/// Helper for callers that want to force an entry's age past its TTL
/// without sleeping real time in tests.
#[cfg(test)]
fn backdate(entry: &mut CacheEntry, ms: u64) {
    entry.insertion_timestamp = entry.insertion_timestamp.saturating_sub(ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(html: &str) -> CacheEntry {
        CacheEntry::new(html.to_string(), String::new(), String::new(), None)
    }

    #[test]
    fn lru_evicts_least_recently_touched() {
        let mut cache = SsrCache::new(SsrCacheConfig {
            max_size: 3,
            ttl_ms: 0,
            use_content_hash: true,
        });
        cache.set("k1".into(), entry("1"));
        cache.set("k2".into(), entry("2"));
        cache.set("k3".into(), entry("3"));
        cache.set("k4".into(), entry("4"));

        assert!(cache.get("k1").is_none());
        assert!(cache.get("k4").is_some());
    }

    #[test]
    fn get_counts_as_a_touch() {
        let mut cache = SsrCache::new(SsrCacheConfig {
            max_size: 3,
            ttl_ms: 0,
            use_content_hash: true,
        });
        cache.set("k1".into(), entry("1"));
        cache.set("k2".into(), entry("2"));
        cache.set("k3".into(), entry("3"));
        assert!(cache.get("k1").is_some());
        cache.set("k4".into(), entry("4"));

        assert!(cache.get("k1").is_some());
        assert!(cache.get("k2").is_none());
    }

    #[test]
    fn ttl_expires_entries() {
        let mut cache = SsrCache::new(SsrCacheConfig {
            max_size: 10,
            ttl_ms: 1000,
            use_content_hash: true,
        });
        cache.set("k1".into(), entry("1"));
        {
            let e = cache.entries.get_mut("k1").unwrap();
            backdate(e, 2000);
        }
        assert!(cache.get("k1").is_none());
        assert!(!cache.has("k1"));
    }

    #[test]
    fn has_does_not_reorder_or_touch_counters() {
        let mut cache = SsrCache::new(SsrCacheConfig {
            max_size: 10,
            ttl_ms: 0,
            use_content_hash: true,
        });
        cache.set("k1".into(), entry("1"));
        cache.set("k2".into(), entry("2"));
        assert!(cache.has("k1"));
        let stats_before = cache.stats();
        assert_eq!(stats_before.hits, 0);
        assert_eq!(stats_before.misses, 0);
    }

    #[test]
    fn hit_rate_is_zero_with_no_activity() {
        let cache = SsrCache::new(SsrCacheConfig::default());
        assert_eq!(cache.stats().hit_rate, 0.0);
    }

    #[test]
    fn invalidate_pattern_compiles_string_sources() {
        let mut cache = SsrCache::new(SsrCacheConfig::default());
        cache.set("/src/App.tsx:abc".into(), entry("1"));
        cache.set("/src/Other.tsx:def".into(), entry("2"));
        let removed = cache.invalidate_pattern("^/src/App").unwrap();
        assert_eq!(removed, 1);
        assert!(!cache.has("/src/App.tsx:abc"));
    }

    #[test]
    fn invalidate_pattern_rejects_malformed_source() {
        let mut cache = SsrCache::new(SsrCacheConfig::default());
        let err = cache.invalidate_pattern("(unterminated").unwrap_err();
        assert!(matches!(err, SsrCacheError::InvalidPattern(_, _)));
    }

    #[test]
    fn invalidate_component_matches_prefix_with_colon() {
        let mut cache = SsrCache::new(SsrCacheConfig::default());
        cache.set("/src/App.tsx:abc:def".into(), entry("1"));
        cache.set("/src/App.tsx.bak:xyz".into(), entry("2"));
        let removed = cache.invalidate_component("/src/App.tsx");
        assert_eq!(removed, 1);
        assert!(cache.has("/src/App.tsx.bak:xyz"));
    }
}
