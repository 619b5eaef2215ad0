//! Error types for the recognizer.
//!
//! Only [`RecognizerError::Remote`] and [`RecognizerError::Transport`] ever
//! reach a `recognize` caller. Cache faults are absorbed by the decorator and
//! configuration faults surface from constructors.

use thiserror::Error;

use crate::cache::CacheError;

/// Errors produced by the recognizer and its collaborators.
#[derive(Debug, Error)]
pub enum RecognizerError {
    /// Invalid credential, unknown cache backend, or unreadable config.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The Wit.ai response carried an `error` field.
    #[error("{0}")]
    Remote(String),

    /// The classify call itself failed (network, non-JSON body).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A cache backend could not be reached while connecting.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A cached or received payload could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl RecognizerError {
    /// Whether this error originates from the remote classify call.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::Transport(_))
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, RecognizerError>;
