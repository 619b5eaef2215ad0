//! In-process cache store with TTL expiry.
//!
//! Records live in a mutex-guarded map. Expiry is checked lazily on `get`
//! and swept on `set`. There is no capacity bound; use Redis or Memcached
//! for anything long-running with a large vocabulary.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;

use super::{short_key, CacheError, CacheStore};

/// A single stored record.
#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    /// Unix timestamp of the last `set` or `touch`.
    refreshed_at: u64,
}

/// TTL-bounded in-memory [`CacheStore`].
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    ttl_secs: u64,
}

impl MemoryStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_secs,
        }
    }

    /// Number of records, including ones that expired but were not swept yet.
    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all records.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.lock() {
            entries.clear();
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, MemoryEntry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("memory store lock poisoned".into()))
    }

    fn is_expired(&self, entry: &MemoryEntry, now: u64) -> bool {
        now.saturating_sub(entry.refreshed_at) > self.ttl_secs
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Self::now_secs();
        let mut entries = self.lock()?;
        let expired = entries.get(key).map(|e| self.is_expired(e, now));
        match expired {
            Some(true) => {
                debug!(key = %short_key(key), "Memory cache entry expired, removing");
                entries.remove(key);
                Ok(None)
            }
            Some(false) => Ok(entries.get(key).map(|e| e.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let now = Self::now_secs();
        let mut entries = self.lock()?;
        let ttl = self.ttl_secs;
        entries.retain(|_, e| now.saturating_sub(e.refreshed_at) <= ttl);
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                refreshed_at: now,
            },
        );
        Ok(())
    }

    async fn touch(&self, key: &str) -> Result<(), CacheError> {
        let now = Self::now_secs();
        let mut entries = self.lock()?;
        if let Some(entry) = entries.get_mut(key) {
            if !self.is_expired(entry, now) {
                entry.refreshed_at = now;
            }
        }
        Ok(())
    }

    fn expire(&self) -> u64 {
        self.ttl_secs
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backdate(store: &MemoryStore, key: &str, secs: u64) {
        let mut entries = store.entries.lock().unwrap();
        entries.get_mut(key).unwrap().refreshed_at -= secs;
    }

    #[tokio::test]
    async fn test_get_miss_then_hit() {
        let store = MemoryStore::new(3600);
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = MemoryStore::new(3600);
        store.set("k", "v1").await.unwrap();
        store.set("k", "v2").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new(10);
        store.set("k", "v").await.unwrap();
        backdate(&store, "k", 11);
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty(), "expired entry removed on read");
    }

    #[tokio::test]
    async fn test_touch_refreshes_ttl_without_changing_value() {
        let store = MemoryStore::new(10);
        store.set("k", "v").await.unwrap();
        backdate(&store, "k", 8);
        store.touch("k").await.unwrap();
        backdate(&store, "k", 8);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_touch_does_not_revive_expired_entry() {
        let store = MemoryStore::new(10);
        store.set("k", "v").await.unwrap();
        backdate(&store, "k", 20);
        store.touch("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_touch_missing_key_is_ok() {
        let store = MemoryStore::new(10);
        assert!(store.touch("nope").await.is_ok());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_sweeps_expired_entries() {
        let store = MemoryStore::new(10);
        store.set("old", "v").await.unwrap();
        backdate(&store, "old", 30);
        store.set("new", "v").await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryStore::new(10);
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_expire_and_name() {
        let store = MemoryStore::new(42);
        assert_eq!(store.expire(), 42);
        assert_eq!(store.name(), "memory");
    }
}
