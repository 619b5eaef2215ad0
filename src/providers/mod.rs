//! Text classification providers.
//!
//! [`Classifier`] is the seam the recognizer calls through. The raw Wit.ai
//! client implements it directly, and so does the cache decorator in
//! [`crate::cache::CachedClassifier`], which lets the two be composed without
//! touching the client.

pub mod wit;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ClassifyContext, RawClassification};

pub use wit::WitClient;

/// Something that turns text into a raw Wit.ai-shaped classification.
///
/// A provider-level failure (bad token, ...) is reported inside the returned
/// value via `error`. `Err` is reserved for the call itself failing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a single utterance.
    async fn classify(&self, text: &str, context: &ClassifyContext) -> Result<RawClassification>;

    /// Name used in log fields.
    fn name(&self) -> &str;
}
