//! Memcached-backed cache store.
//!
//! The TTL is bound once at construction and reused for `set` and the
//! native `touch`. The `memcache` client is blocking, so every call runs on
//! tokio's blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::{short_key, CacheError, CacheStore};

/// Memcached treats exptimes above 30 days as absolute unix timestamps.
const MAX_RELATIVE_EXPTIME: u64 = 30 * 24 * 3600;

/// The slice of the memcached client the store needs.
#[cfg_attr(test, mockall::automock)]
pub trait MemcacheOps: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str, exptime: u32) -> Result<(), CacheError>;
    /// Returns `false` when the key does not exist.
    fn touch(&self, key: &str, exptime: u32) -> Result<bool, CacheError>;
}

impl MemcacheOps for memcache::Client {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(memcache::Client::get::<String>(self, key)?)
    }

    fn set(&self, key: &str, value: &str, exptime: u32) -> Result<(), CacheError> {
        Ok(memcache::Client::set(self, key, value, exptime)?)
    }

    fn touch(&self, key: &str, exptime: u32) -> Result<bool, CacheError> {
        Ok(memcache::Client::touch(self, key, exptime)?)
    }
}

/// [`CacheStore`] over a memcached client.
pub struct MemcachedStore<C: MemcacheOps = memcache::Client> {
    client: Arc<C>,
    expire: u64,
}

impl<C: MemcacheOps> MemcachedStore<C> {
    pub fn new(client: C, expire: u64) -> Self {
        Self {
            client: Arc::new(client),
            expire,
        }
    }

    /// Exptime argument for the configured TTL.
    fn exptime(&self) -> u32 {
        let secs = if self.expire > MAX_RELATIVE_EXPTIME {
            (Utc::now().timestamp().max(0) as u64).saturating_add(self.expire)
        } else {
            self.expire
        };
        u32::try_from(secs).unwrap_or(u32::MAX)
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&C) -> Result<T, CacheError> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || op(&client))
            .await
            .map_err(|e| CacheError::Backend(format!("memcached task failed: {}", e)))?
    }
}

impl MemcachedStore<memcache::Client> {
    /// Connect to `url` (e.g. `memcache://127.0.0.1:11211`).
    ///
    /// The pool dials eagerly, so this runs on the blocking pool too.
    pub async fn connect_client(url: &str) -> Result<memcache::Client, CacheError> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || memcache::Client::connect(url.as_str()))
            .await
            .map_err(|e| CacheError::Connection(format!("memcached connect task failed: {}", e)))?
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl<C: MemcacheOps> CacheStore for MemcachedStore<C> {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_string();
        self.blocking(move |c| c.get(&key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let key = key.to_string();
        let value = value.to_string();
        let exptime = self.exptime();
        self.blocking(move |c| c.set(&key, &value, exptime)).await
    }

    async fn touch(&self, key: &str) -> Result<(), CacheError> {
        let owned = key.to_string();
        let exptime = self.exptime();
        let found = self.blocking(move |c| c.touch(&owned, exptime)).await?;
        if !found {
            debug!(key = %short_key(key), "memcached touch on missing key");
        }
        Ok(())
    }

    fn expire(&self) -> u64 {
        self.expire
    }

    fn name(&self) -> &str {
        "memcached"
    }
}
