//! Wit.ai intent recognition for dialog frameworks.
//!
//! Turns Wit.ai `/message` responses into a `{score, intent, intents,
//! entities}` result and optionally memoizes responses in Redis or Memcached
//! so identical utterances skip the network.
//!
//! ```rust,no_run
//! use wit_recognizer::{RecognizeContext, RecognizerOptions, WitRecognizer};
//!
//! # tokio_test::block_on(async {
//! let recognizer = WitRecognizer::new("WIT_SERVER_TOKEN", RecognizerOptions::default())?;
//! let result = recognizer
//!     .recognize(&RecognizeContext::from_text("set an alarm for 7am"))
//!     .await?;
//! println!("{:?} ({})", result.intent, result.score);
//! # Ok::<(), wit_recognizer::RecognizerError>(())
//! # });
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod providers;
pub mod recognizer;
pub mod types;

pub use cache::{CacheClient, CacheStore, CachedClassifier};
pub use config::Config;
pub use error::{RecognizerError, Result};
pub use providers::{Classifier, WitClient};
pub use recognizer::{RecognizerOptions, WitRecognizer};
pub use types::{
    ClassifyContext, NormalizedEntity, NormalizedResult, RawClassification, RawEntityMatch,
    RecognizeContext,
};
