//! Cache-aside decorator for classifiers.
//!
//! Lookup before the remote call, store after a successful miss. Cache
//! writes (`touch` after a hit, `set` after a miss) run as detached tasks on
//! a [`TaskTracker`]; their outcome only ever reaches the log.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::Result;
use crate::providers::Classifier;
use crate::types::{ClassifyContext, RawClassification};

use super::{cache_key, short_key, CacheStore};

/// Wraps a [`Classifier`] with a cache-aside read/write cycle.
pub struct CachedClassifier {
    inner: Arc<dyn Classifier>,
    store: Arc<dyn CacheStore>,
    prefix: String,
    tasks: TaskTracker,
}

impl CachedClassifier {
    pub fn new(inner: Arc<dyn Classifier>, store: Arc<dyn CacheStore>, prefix: &str) -> Self {
        Self {
            inner,
            store,
            prefix: prefix.to_string(),
            tasks: TaskTracker::new(),
        }
    }

    /// Cache key for `text` under this decorator's prefix.
    pub fn key_for(&self, text: &str) -> String {
        cache_key(&self.prefix, text)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Number of background cache writes still running.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every background cache write spawned so far.
    ///
    /// Classification keeps working during and after the flush.
    pub async fn flush(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Read and decode a cached classification. Any failure is a miss.
    async fn lookup(&self, key: &str) -> Option<RawClassification> {
        let stored = match self.store.get(key).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(e) => {
                warn!(backend = self.store.name(), key = %short_key(key), error = %e, "Cache lookup failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<RawClassification>(&stored) {
            Ok(raw) => Some(raw),
            Err(e) => {
                debug!(backend = self.store.name(), key = %short_key(key), error = %e, "Cached value unreadable, treating as miss");
                None
            }
        }
    }

    fn spawn_touch(&self, key: String) {
        let store = Arc::clone(&self.store);
        self.tasks.spawn(async move {
            if let Err(e) = store.touch(&key).await {
                warn!(backend = store.name(), key = %short_key(&key), error = %e, "Cache touch failed");
            }
        });
    }

    fn spawn_set(&self, key: String, value: String) {
        let store = Arc::clone(&self.store);
        self.tasks.spawn(async move {
            match store.set(&key, &value).await {
                Ok(()) => debug!(backend = store.name(), key = %short_key(&key), "Cached classification"),
                Err(e) => {
                    warn!(backend = store.name(), key = %short_key(&key), error = %e, "Cache write failed")
                }
            }
        });
    }
}

#[async_trait]
impl Classifier for CachedClassifier {
    async fn classify(&self, text: &str, context: &ClassifyContext) -> Result<RawClassification> {
        let key = self.key_for(text);

        if let Some(raw) = self.lookup(&key).await {
            debug!(backend = self.store.name(), key = %short_key(&key), "Cache hit");
            self.spawn_touch(key);
            return Ok(raw);
        }

        debug!(backend = self.store.name(), key = %short_key(&key), "Cache miss");
        let raw = self.inner.classify(text, context).await?;

        if raw.is_error() {
            return Ok(raw);
        }
        match serde_json::to_string(&raw) {
            Ok(value) => self.spawn_set(key, value),
            Err(e) => warn!(error = %e, "Failed to serialize classification for cache"),
        }
        Ok(raw)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MemoryStore, MockCacheStore};
    use crate::error::RecognizerError;
    use crate::types::{EntityMap, RawEntityMatch};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// What the fake remote classifier answers with.
    #[derive(Clone)]
    enum Reply {
        Ok(RawClassification),
        Transport(&'static str),
    }

    struct FakeClassifier {
        reply: Reply,
        calls: AtomicUsize,
    }

    impl FakeClassifier {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        async fn classify(&self, _text: &str, _ctx: &ClassifyContext) -> Result<RawClassification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Ok(raw) => Ok(raw.clone()),
                Reply::Transport(msg) => Err(RecognizerError::Transport(msg.to_string())),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    /// Store that records every call and can be told to fail.
    struct RecordingStore {
        inner: MemoryStore,
        calls: Mutex<Vec<(&'static str, String)>>,
        fail: bool,
        preset: Option<String>,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self::unwrapped())
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::unwrapped()
            })
        }

        fn returning(stored: &str) -> Arc<Self> {
            Arc::new(Self {
                preset: Some(stored.to_string()),
                ..Self::unwrapped()
            })
        }

        fn unwrapped() -> Self {
            Self {
                inner: MemoryStore::new(3600),
                calls: Mutex::new(Vec::new()),
                fail: false,
                preset: None,
            }
        }

        fn ops(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().iter().map(|(op, _)| *op).collect()
        }

        fn keys(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(_, k)| k.clone()).collect()
        }

        fn record(&self, op: &'static str, key: &str) -> std::result::Result<(), CacheError> {
            self.calls.lock().unwrap().push((op, key.to_string()));
            if self.fail {
                Err(CacheError::Backend(format!("{} refused", op)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
            self.record("get", key)?;
            if let Some(preset) = &self.preset {
                return Ok(Some(preset.clone()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> std::result::Result<(), CacheError> {
            self.record("set", key)?;
            self.inner.set(key, value).await
        }

        async fn touch(&self, key: &str) -> std::result::Result<(), CacheError> {
            self.record("touch", key)?;
            self.inner.touch(key).await
        }

        fn expire(&self) -> u64 {
            self.inner.expire()
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn sample() -> RawClassification {
        RawClassification::new(
            "turn on the lights",
            EntityMap::new()
                .with("intent", vec![RawEntityMatch::untyped("lights_on", 0.97)])
                .with("room", vec![RawEntityMatch::value("lights", 0.8)]),
        )
    }

    fn ctx() -> ClassifyContext {
        ClassifyContext::default()
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let remote = FakeClassifier::new(Reply::Ok(sample()));
        let store = RecordingStore::new();
        let cached = CachedClassifier::new(remote.clone(), store.clone(), "");

        let first = cached.classify("turn on the lights", &ctx()).await.unwrap();
        cached.flush().await;
        let second = cached.classify("turn on the lights", &ctx()).await.unwrap();
        cached.flush().await;

        assert_eq!(remote.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(store.ops(), vec!["get", "set", "get", "touch"]);
    }

    #[tokio::test]
    async fn test_hit_does_not_call_remote() {
        let stored = serde_json::to_string(&sample()).unwrap();
        let remote = FakeClassifier::new(Reply::Transport("must not be called"));
        let store = RecordingStore::returning(&stored);
        let cached = CachedClassifier::new(remote.clone(), store.clone(), "");

        let raw = cached.classify("anything", &ctx()).await.unwrap();
        cached.flush().await;

        assert_eq!(raw, sample());
        assert_eq!(remote.calls(), 0);
        assert_eq!(store.ops(), vec!["get", "touch"]);
    }

    #[tokio::test]
    async fn test_transport_error_propagates_and_is_not_cached() {
        let remote = FakeClassifier::new(Reply::Transport("connection reset"));
        let store = RecordingStore::new();
        let cached = CachedClassifier::new(remote.clone(), store.clone(), "");

        let err = cached.classify("hello", &ctx()).await.unwrap_err();
        cached.flush().await;

        assert!(matches!(err, RecognizerError::Transport(ref m) if m == "connection reset"));
        assert_eq!(store.ops(), vec!["get"]);
        assert!(store.inner.is_empty());
    }

    #[tokio::test]
    async fn test_error_response_is_returned_but_not_cached() {
        let remote = FakeClassifier::new(Reply::Ok(RawClassification::failed("Bad auth")));
        let store = RecordingStore::new();
        let cached = CachedClassifier::new(remote.clone(), store.clone(), "");

        let raw = cached.classify("hello", &ctx()).await.unwrap();
        cached.flush().await;

        assert_eq!(raw.error.as_deref(), Some("Bad auth"));
        assert_eq!(store.ops(), vec!["get"]);
    }

    #[tokio::test]
    async fn test_store_failures_degrade_to_uncached() {
        let remote = FakeClassifier::new(Reply::Ok(sample()));
        let store = RecordingStore::failing();
        let cached = CachedClassifier::new(remote.clone(), store.clone(), "");

        for _ in 0..2 {
            let raw = cached.classify("turn on the lights", &ctx()).await.unwrap();
            assert_eq!(raw, sample());
            cached.flush().await;
        }

        assert_eq!(remote.calls(), 2);
        assert_eq!(store.ops(), vec!["get", "set", "get", "set"]);
    }

    #[tokio::test]
    async fn test_unparsable_cached_value_is_a_miss() {
        for stored in ["not json", "null", "\"just a string\""] {
            let remote = FakeClassifier::new(Reply::Ok(sample()));
            let store = RecordingStore::returning(stored);
            let cached = CachedClassifier::new(remote.clone(), store.clone(), "");

            let raw = cached.classify("hello", &ctx()).await.unwrap();
            cached.flush().await;

            assert_eq!(raw, sample(), "stored value {:?}", stored);
            assert_eq!(remote.calls(), 1);
            assert_eq!(store.ops(), vec!["get", "set"]);
        }
    }

    #[tokio::test]
    async fn test_prefix_applied_to_every_operation() {
        let remote = FakeClassifier::new(Reply::Ok(sample()));
        let store = RecordingStore::new();
        let cached = CachedClassifier::new(remote, store.clone(), "wit:");

        cached.classify("hello", &ctx()).await.unwrap();
        cached.flush().await;

        let expected = cache_key("wit:", "hello");
        assert_eq!(cached.key_for("hello"), expected);
        assert!(store.keys().iter().all(|k| *k == expected));
    }

    #[tokio::test]
    async fn test_context_does_not_change_key() {
        let remote = FakeClassifier::new(Reply::Ok(sample()));
        let store = RecordingStore::new();
        let cached = CachedClassifier::new(remote.clone(), store, "");

        cached.classify("hello", &ctx()).await.unwrap();
        cached.flush().await;
        let other = ClassifyContext {
            timezone: Some("Asia/Tokyo".into()),
            ..ClassifyContext::default()
        };
        cached.classify("hello", &other).await.unwrap();

        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_misses_both_call_remote() {
        let remote = FakeClassifier::new(Reply::Ok(sample()));
        let store = RecordingStore::new();
        let cached = CachedClassifier::new(remote.clone(), store.clone(), "");

        let context = ctx();
        let (a, b) = tokio::join!(
            cached.classify("hello", &context),
            cached.classify("hello", &context)
        );
        cached.flush().await;

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(remote.calls(), 2);
        assert_eq!(store.inner.len(), 1);
        assert_eq!(cached.pending(), 0);
    }

    #[tokio::test]
    async fn test_name_is_inner_name() {
        let cached = CachedClassifier::new(
            FakeClassifier::new(Reply::Ok(sample())),
            RecordingStore::new(),
            "",
        );
        assert_eq!(cached.name(), "fake");
        assert_eq!(cached.store().name(), "recording");
        assert_eq!(cached.prefix(), "");
    }

    #[tokio::test]
    async fn test_miss_stores_response_verbatim() {
        let mut raw = sample();
        raw.extra.insert("msg_id".into(), serde_json::json!("0a1b2c"));
        let expected = serde_json::to_string(&raw).unwrap();
        let key = cache_key("", "turn on the lights");

        let mut store = MockCacheStore::new();
        store.expect_name().return_const("mock".to_string());
        let get_key = key.clone();
        store
            .expect_get()
            .withf(move |k| k.to_string() == get_key)
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_set()
            .withf(move |k, v| k.to_string() == key && v.to_string() == expected)
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_touch().never();

        let cached = CachedClassifier::new(FakeClassifier::new(Reply::Ok(raw)), Arc::new(store), "");
        let result = cached.classify("turn on the lights", &ctx()).await.unwrap();
        cached.flush().await;
        assert_eq!(result.extra["msg_id"], "0a1b2c");
    }

    #[tokio::test]
    async fn test_failed_touch_still_returns_hit() {
        let stored = serde_json::to_string(&sample()).unwrap();

        let mut store = MockCacheStore::new();
        store.expect_name().return_const("mock".to_string());
        store
            .expect_get()
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        store
            .expect_touch()
            .times(1)
            .returning(|_| Err(CacheError::Connection("connection reset".into())));
        store.expect_set().never();

        let remote = FakeClassifier::new(Reply::Transport("must not be called"));
        let cached = CachedClassifier::new(remote.clone(), Arc::new(store), "");
        let result = cached.classify("turn on the lights", &ctx()).await.unwrap();
        cached.flush().await;

        assert_eq!(result, sample());
        assert_eq!(remote.calls(), 0);
    }
}
