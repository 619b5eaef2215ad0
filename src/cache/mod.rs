//! Response caching for Wit.ai classifications.
//!
//! [`CacheStore`] is the uniform get/set/touch surface over a key/value
//! backend; [`CachedClassifier`] decorates any [`Classifier`] with a
//! cache-aside read/write cycle on top of it.
//!
//! ```text
//! CacheClient (caller-selected)
//!   ├── Redis(ConnectionManager)   -> RedisStore      SET .. EX ttl / EXPIRE
//!   ├── Memcached(memcache::Client) -> MemcachedStore set(.., ttl) / touch
//!   └── Custom(Arc<dyn CacheStore>)  (MemoryStore, test doubles, ...)
//! ```
//!
//! [`Classifier`]: crate::providers::Classifier

pub mod cached;
pub mod memcached_store;
pub mod memory;
pub mod redis_store;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use cached::CachedClassifier;
pub use memcached_store::{MemcacheOps, MemcachedStore};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Default record lifetime: three hours.
pub const DEFAULT_EXPIRE_SECS: u64 = 3 * 3600;

/// Failures from a cache backend. Never surfaced to `recognize` callers.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache connection failed: {0}")]
    Connection(String),

    #[error("Cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            Self::Connection(e.to_string())
        } else {
            Self::Backend(e.to_string())
        }
    }
}

impl From<memcache::MemcacheError> for CacheError {
    fn from(e: memcache::MemcacheError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Key/value store with a fixed TTL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a raw stored value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value` for [`expire`](Self::expire) seconds.
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Reset the TTL of `key` to [`expire`](Self::expire) without changing
    /// its value. Touching a missing key is not an error.
    async fn touch(&self, key: &str) -> Result<(), CacheError>;

    /// Configured TTL in seconds.
    fn expire(&self) -> u64;

    /// Backend name used in log fields.
    fn name(&self) -> &str;
}

/// An explicitly selected cache backend.
pub enum CacheClient {
    Redis(redis::aio::ConnectionManager),
    Memcached(memcache::Client),
    /// A ready-made store; its own TTL applies.
    Custom(Arc<dyn CacheStore>),
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redis(_) => f.write_str("CacheClient::Redis"),
            Self::Memcached(_) => f.write_str("CacheClient::Memcached"),
            Self::Custom(store) => write!(f, "CacheClient::Custom({})", store.name()),
        }
    }
}

impl CacheClient {
    /// Wrap the client in the adapter matching its variant.
    pub fn into_store(self, expire: u64) -> Arc<dyn CacheStore> {
        match self {
            Self::Redis(conn) => Arc::new(RedisStore::new(conn, expire)),
            Self::Memcached(client) => Arc::new(MemcachedStore::new(client, expire)),
            Self::Custom(store) => store,
        }
    }
}

/// Content-addressed cache key: `prefix` + hex SHA-256 of `text`.
///
/// Only the text participates; per-call provider context does not.
pub fn cache_key(prefix: &str, text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{}{}", prefix, hex::encode(digest))
}

/// Log-friendly key: the first 8 chars.
pub(crate) fn short_key(key: &str) -> &str {
    key.char_indices()
        .nth(8)
        .map(|(idx, _)| &key[..idx])
        .unwrap_or(key)
}
