//! Short-lived cache of the last chosen node per (client, method).

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use crate::health::prober::HealthRecord;
use crate::observability::metrics;

/// Cache key: client identifier and HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    pub client: String,
    pub method: String,
}

impl SelectionKey {
    pub fn new(client: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            method: method.into(),
        }
    }
}

/// A previously chosen node and when it was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub server: String,
    pub version: Value,
    pub blockchain_version: String,
    pub freshness: i64,
    pub timestamp: Instant,
}

impl CacheEntry {
    pub fn from_record(record: &HealthRecord, timestamp: Instant) -> Self {
        Self {
            server: record.server.clone(),
            version: record.version.clone(),
            blockchain_version: record.blockchain_version.clone(),
            freshness: record.freshness,
            timestamp,
        }
    }
}

/// TTL-bounded selection cache.
///
/// Every access goes through the map's shard locks, so interleaved requests
/// from the same client never observe a torn entry.
#[derive(Debug)]
pub struct SelectionCache {
    entries: DashMap<SelectionKey, CacheEntry>,
    ttl: Duration,
}

impl SelectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.timestamp) < self.ttl
    }

    /// Stored entry while younger than the TTL, otherwise a miss.
    pub fn get(&self, key: &SelectionKey) -> Option<CacheEntry> {
        self.get_at(key, Instant::now())
    }

    /// An expired entry is evicted on the miss.
    pub fn get_at(&self, key: &SelectionKey, now: Instant) -> Option<CacheEntry> {
        let hit = self
            .entries
            .get(key)
            .and_then(|entry| self.is_fresh(&entry, now).then(|| entry.value().clone()));
        if hit.is_none() {
            // shard guard from `get` is released above
            self.entries.remove_if(key, |_, entry| !self.is_fresh(entry, now));
        }
        metrics::record_cache(hit.is_some());
        hit
    }

    /// Drop every entry older than the TTL.
    pub fn purge_expired(&self, now: Instant) {
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
    }

    /// Unconditionally overwrite the entry for `key`.
    pub fn set(&self, key: SelectionKey, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(server: &str, at: Instant) -> CacheEntry {
        CacheEntry {
            server: server.to_string(),
            version: json!({"result": {"blockchain_version": "0.23.1"}}),
            blockchain_version: "0.23.1".to_string(),
            freshness: 42,
            timestamp: at,
        }
    }

    #[test]
    fn hit_before_ttl_miss_at_ttl() {
        let cache = SelectionCache::new(Duration::from_secs(3));
        let key = SelectionKey::new("10.0.0.1", "GET");
        let t0 = Instant::now();
        cache.set(key.clone(), entry("https://a", t0));

        assert!(cache.get_at(&key, t0 + Duration::from_millis(2_999)).is_some());
        assert!(cache.get_at(&key, t0 + Duration::from_secs(3)).is_none());
        assert!(cache.get_at(&key, t0 + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn keys_separate_client_and_method() {
        let cache = SelectionCache::new(Duration::from_secs(3));
        let t0 = Instant::now();
        cache.set(SelectionKey::new("10.0.0.1", "GET"), entry("https://a", t0));

        assert!(cache.get_at(&SelectionKey::new("10.0.0.1", "POST"), t0).is_none());
        assert!(cache.get_at(&SelectionKey::new("10.0.0.2", "GET"), t0).is_none());
    }

    #[test]
    fn set_overwrites() {
        let cache = SelectionCache::new(Duration::from_secs(3));
        let key = SelectionKey::new("c", "GET");
        let t0 = Instant::now();
        cache.set(key.clone(), entry("https://a", t0));
        cache.set(key.clone(), entry("https://b", t0));
        assert_eq!(cache.get_at(&key, t0).unwrap().server, "https://b");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let cache = SelectionCache::new(Duration::from_secs(3));
        let t0 = Instant::now();
        let key = |i: u32| SelectionKey::new(format!("10.0.{}.{}", i / 256, i % 256), "GET");
        for i in 0..1_000 {
            cache.set(key(i), entry("https://a", t0));
        }
        let later = t0 + Duration::from_secs(5);
        for i in 0..1_000 {
            assert!(cache.get_at(&key(i), later).is_none());
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn fresh_entry_survives_a_miss_on_another_key() {
        let cache = SelectionCache::new(Duration::from_secs(3));
        let t0 = Instant::now();
        let key = SelectionKey::new("c", "GET");
        cache.set(key.clone(), entry("https://a", t0));
        assert!(cache.get_at(&SelectionKey::new("c", "POST"), t0).is_none());
        assert!(cache.get_at(&key, t0 + Duration::from_secs(1)).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn purge_keeps_only_fresh_entries() {
        let cache = SelectionCache::new(Duration::from_secs(3));
        let t0 = Instant::now();
        cache.set(SelectionKey::new("old", "GET"), entry("https://a", t0));
        let t4 = t0 + Duration::from_secs(4);
        cache.set(SelectionKey::new("new", "GET"), entry("https://b", t4));

        let t5 = t0 + Duration::from_secs(5);
        cache.purge_expired(t5);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at(&SelectionKey::new("new", "GET"), t5).is_some());
    }
}
