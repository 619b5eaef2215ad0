//! Configuration: JSON file plus environment overrides.
//!
//! Default location is `~/.wit-recognizer/config.json`. Every field is
//! optional; environment variables (`WIT_*`) win over the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use crate::cache::{
    CacheClient, MemcachedStore, MemoryStore, RedisStore, DEFAULT_EXPIRE_SECS,
};
use crate::error::{RecognizerError, Result};
use crate::providers::wit::{DEFAULT_API_VERSION, DEFAULT_TIMEOUT_SECS, WIT_API_BASE};
use crate::recognizer::RecognizerOptions;

/// Default Redis endpoint.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default memcached endpoint.
pub const DEFAULT_MEMCACHED_URL: &str = "memcache://127.0.0.1:11211";

/// Wit.ai client settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WitConfig {
    /// Server access token.
    pub access_token: String,
    /// Value of the `v` query parameter.
    pub api_version: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for WitConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: WIT_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for WitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WitConfig")
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which cache backend to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Redis,
    Memcached,
    /// In-process; only useful for long-running embedders and tests.
    Memory,
}

impl CacheBackend {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memcached" => Ok(Self::Memcached),
            "memory" => Ok(Self::Memory),
            other => Err(RecognizerError::Config(format!(
                "Invalid cache client '{}': expected redis, memcached or memory",
                other
            ))),
        }
    }
}

/// Response cache settings. Absent section means no caching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Backend endpoint; a per-backend default is used when unset.
    pub url: Option<String>,
    /// Record lifetime in seconds. Non-integer values fall back to the default.
    #[serde(deserialize_with = "lenient_expire")]
    pub expire: u64,
    /// Prepended to every cache key.
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            url: None,
            expire: DEFAULT_EXPIRE_SECS,
            prefix: String::new(),
        }
    }
}

/// Accept any JSON value; anything but a non-negative integer means default.
fn lenient_expire<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64().unwrap_or(DEFAULT_EXPIRE_SECS))
}

impl CacheConfig {
    /// Endpoint for the selected backend.
    pub fn effective_url(&self) -> &str {
        match (&self.url, self.backend) {
            (Some(url), _) => url,
            (None, CacheBackend::Redis) => DEFAULT_REDIS_URL,
            (None, CacheBackend::Memcached) => DEFAULT_MEMCACHED_URL,
            (None, CacheBackend::Memory) => "",
        }
    }

    /// Connect the configured backend.
    pub async fn connect(&self) -> Result<CacheClient> {
        let url = self.effective_url();
        info!(backend = ?self.backend, url = %redact_url(url), "Connecting response cache");
        let client = match self.backend {
            CacheBackend::Redis => CacheClient::Redis(RedisStore::connect_manager(url).await?),
            CacheBackend::Memcached => {
                CacheClient::Memcached(MemcachedStore::connect_client(url).await?)
            }
            CacheBackend::Memory => CacheClient::Custom(Arc::new(MemoryStore::new(self.expire))),
        };
        Ok(client)
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wit: WitConfig,
    pub cache: Option<CacheConfig>,
}

impl Config {
    /// `~/.wit-recognizer`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wit-recognizer")
    }

    /// `~/.wit-recognizer/config.json`.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default path (missing file means defaults), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::path();
        let mut config = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a config file without environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            RecognizerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
            .map_err(|e| RecognizerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse a JSON document. An unknown cache backend is rejected.
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| RecognizerError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Apply `WIT_*` environment variables on top of the loaded values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = var("WIT_ACCESS_TOKEN") {
            self.wit.access_token = token;
        }
        if let Some(version) = var("WIT_API_VERSION") {
            self.wit.api_version = version;
        }
        if let Some(base) = var("WIT_BASE_URL") {
            self.wit.base_url = base;
        }

        let backend = var("WIT_CACHE_BACKEND");
        let url = var("WIT_CACHE_URL");
        let expire = var("WIT_CACHE_EXPIRE");
        let prefix = var("WIT_CACHE_PREFIX");
        if backend.is_none() && url.is_none() && expire.is_none() && prefix.is_none() {
            return Ok(());
        }

        let cache = self.cache.get_or_insert_with(CacheConfig::default);
        if let Some(backend) = backend {
            cache.backend = CacheBackend::parse(&backend)?;
        }
        if let Some(url) = url {
            cache.url = Some(url);
        }
        if let Some(expire) = expire {
            cache.expire = expire.trim().parse().unwrap_or(DEFAULT_EXPIRE_SECS);
        }
        if let Some(prefix) = prefix {
            cache.prefix = prefix;
        }
        Ok(())
    }

    /// Build recognizer options, connecting the cache backend if configured.
    pub async fn recognizer_options(&self) -> Result<RecognizerOptions> {
        let Some(cache) = &self.cache else {
            return Ok(RecognizerOptions::default());
        };
        Ok(RecognizerOptions {
            cache: Some(cache.connect().await?),
            expire: cache.expire,
            prefix: cache.prefix.clone(),
        })
    }
}

/// Mask the password component of a backend URL for logging.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}
