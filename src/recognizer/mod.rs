//! Intent recognizer for dialog frameworks.
//!
//! [`WitRecognizer`] owns a [`Classifier`]: either the raw [`WitClient`] or
//! that client wrapped in a [`CachedClassifier`]. Every raw response goes
//! through [`normalize`] before it is handed back.

pub mod normalize;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{CacheClient, CachedClassifier, DEFAULT_EXPIRE_SECS};
use crate::config::Config;
use crate::error::{RecognizerError, Result};
use crate::providers::{Classifier, WitClient};
use crate::types::{ClassifyContext, NormalizedResult, RecognizeContext};

pub use normalize::{normalize, NONE_INTENT, NONE_INTENT_SCORE};

/// Construction options.
#[derive(Debug)]
pub struct RecognizerOptions {
    /// Cache backend; `None` disables caching.
    pub cache: Option<CacheClient>,
    /// Record lifetime in seconds for Redis/Memcached clients.
    pub expire: u64,
    /// Prepended to every cache key.
    pub prefix: String,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            cache: None,
            expire: DEFAULT_EXPIRE_SECS,
            prefix: String::new(),
        }
    }
}

impl RecognizerOptions {
    pub fn with_cache(cache: CacheClient) -> Self {
        Self {
            cache: Some(cache),
            ..Self::default()
        }
    }
}

/// Wit.ai-backed recognizer producing [`NormalizedResult`]s.
pub struct WitRecognizer {
    classifier: Arc<dyn Classifier>,
    cached: Option<Arc<CachedClassifier>>,
}

impl WitRecognizer {
    /// Build a recognizer talking to Wit.ai with `access_token`.
    ///
    /// Fails with [`RecognizerError::Config`] when the token is empty.
    pub fn new(access_token: &str, options: RecognizerOptions) -> Result<Self> {
        let client = WitClient::new(access_token)?;
        Ok(Self::with_classifier(Arc::new(client), options))
    }

    /// Build from a loaded [`Config`], connecting the cache if configured.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = WitClient::from_config(&config.wit)?;
        let options = config.recognizer_options().await?;
        Ok(Self::with_classifier(Arc::new(client), options))
    }

    /// Compose a recognizer around any classifier.
    pub fn with_classifier(classifier: Arc<dyn Classifier>, options: RecognizerOptions) -> Self {
        let Some(cache) = options.cache else {
            return Self {
                classifier,
                cached: None,
            };
        };

        let store = cache.into_store(options.expire);
        debug!(backend = store.name(), expire = store.expire(), "Response cache enabled");
        let cached = Arc::new(CachedClassifier::new(classifier, store, &options.prefix));
        Self {
            classifier: cached.clone(),
            cached: Some(cached),
        }
    }

    /// The classifier `recognize` calls through.
    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    /// The cache decorator, when caching is enabled.
    pub fn cache(&self) -> Option<&CachedClassifier> {
        self.cached.as_deref()
    }

    /// Recognize the intent and entities of the turn's message.
    ///
    /// A missing or empty text resolves to the default result without a
    /// remote call.
    pub async fn recognize(&self, context: &RecognizeContext) -> Result<NormalizedResult> {
        self.recognize_in(context, &ClassifyContext::default()).await
    }

    /// [`recognize`](Self::recognize) with a provider context (reference
    /// time, timezone, locale).
    pub async fn recognize_in(
        &self,
        context: &RecognizeContext,
        classify_context: &ClassifyContext,
    ) -> Result<NormalizedResult> {
        let Some(utterance) = context.utterance() else {
            return Ok(NormalizedResult::default());
        };

        let raw = self.classifier.classify(utterance, classify_context).await?;
        if let Some(message) = raw.error.as_deref() {
            warn!(provider = self.classifier.name(), error = %message, "Wit.ai rejected the request");
            return Err(RecognizerError::Remote(message.to_string()));
        }

        Ok(normalize(&raw))
    }

    /// Callback form for dialog frameworks: `done(error, result)` receives
    /// exactly one of the two.
    pub async fn recognize_with<F>(&self, context: &RecognizeContext, done: F)
    where
        F: FnOnce(Option<RecognizerError>, Option<NormalizedResult>),
    {
        match self.recognize(context).await {
            Ok(result) => done(None, Some(result)),
            Err(e) => done(Some(e), None),
        }
    }

    /// Wait for outstanding background cache writes. No-op without a cache.
    pub async fn flush(&self) {
        if let Some(cached) = &self.cached {
            cached.flush().await;
        }
    }
}

impl std::fmt::Debug for WitRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WitRecognizer")
            .field("classifier", &self.classifier.name())
            .field("cache", &self.cached.as_ref().map(|c| c.store().name()))
            .finish()
    }
}
