//! Redis-backed cache store.
//!
//! The TTL travels with every write (`SET key value EX ttl`) and `touch` is
//! an `EXPIRE`. Commands go through a cloned [`ConnectionManager`], which
//! reconnects on its own after a dropped connection.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Cmd;

use super::{CacheError, CacheStore};

/// [`CacheStore`] over a Redis connection.
pub struct RedisStore {
    conn: ConnectionManager,
    expire: u64,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, expire: u64) -> Self {
        Self { conn, expire }
    }

    /// Open a managed connection to `url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect_manager(url: &str) -> Result<ConnectionManager, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }

    fn get_cmd(key: &str) -> Cmd {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        cmd
    }

    fn set_cmd(key: &str, value: &str, expire: u64) -> Cmd {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(expire);
        cmd
    }

    fn touch_cmd(key: &str, expire: u64) -> Cmd {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(expire);
        cmd
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = Self::get_cmd(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = Self::set_cmd(key, value, self.expire)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn touch(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // 0 when the key is gone; nothing to refresh.
        let _: i64 = Self::touch_cmd(key, self.expire)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    fn expire(&self) -> u64 {
        self.expire
    }

    fn name(&self) -> &str {
        "redis"
    }
}
