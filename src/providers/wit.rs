//! Wit.ai `/message` client.
//!
//! Auth is a bearer server access token. Error bodies (`{"error": ..,
//! "code": ..}`) are handed back as a [`RawClassification`] so the caller can
//! surface the provider's own message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::WitConfig;
use crate::error::{RecognizerError, Result};
use crate::types::{ClassifyContext, RawClassification};

use super::Classifier;

/// Wit.ai REST API base.
pub const WIT_API_BASE: &str = "https://api.wit.ai";

/// API version sent as `v=` when none is configured.
pub const DEFAULT_API_VERSION: &str = "20170307";

/// Request timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Thin client for `GET /message`.
pub struct WitClient {
    access_token: String,
    api_version: String,
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for WitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WitClient")
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl WitClient {
    /// Build a client with the default base URL, API version and timeout.
    pub fn new(access_token: &str) -> Result<Self> {
        Self::from_config(&WitConfig {
            access_token: access_token.to_string(),
            ..WitConfig::default()
        })
    }

    /// Build a client from the `wit` config section.
    ///
    /// Fails with [`RecognizerError::Config`] when the token is empty.
    pub fn from_config(config: &WitConfig) -> Result<Self> {
        let access_token = config.access_token.trim();
        if access_token.is_empty() {
            return Err(RecognizerError::Config(
                "access token must be a non-empty string".into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RecognizerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            access_token: access_token.to_string(),
            api_version: config.api_version.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    fn message_url(&self) -> String {
        format!("{}/message", self.base_url)
    }

    /// Query string for a classify call.
    fn query(&self, text: &str, context: &ClassifyContext) -> Result<Vec<(&'static str, String)>> {
        let mut query = vec![("v", self.api_version.clone()), ("q", text.to_string())];
        if !context.is_empty() {
            query.push(("context", serde_json::to_string(context)?));
        }
        Ok(query)
    }

    /// Interpret a response body.
    ///
    /// Any body that parses and carries `error` is returned as-is regardless
    /// of status. A non-2xx status without an `error` field, or a body that
    /// is not JSON, is a transport failure.
    fn parse_response(status: StatusCode, body: &str) -> Result<RawClassification> {
        match serde_json::from_str::<RawClassification>(body) {
            Ok(raw) if status.is_success() || raw.is_error() => Ok(raw),
            Ok(_) => Err(RecognizerError::Transport(format!(
                "Wit.ai returned HTTP {}: {}",
                status, body
            ))),
            Err(e) => Err(RecognizerError::Transport(format!(
                "Failed to parse Wit.ai response (HTTP {}): {}",
                status, e
            ))),
        }
    }
}

#[async_trait]
impl Classifier for WitClient {
    async fn classify(&self, text: &str, context: &ClassifyContext) -> Result<RawClassification> {
        debug!(version = %self.api_version, chars = text.chars().count(), "Wit.ai message request");

        let response = self
            .client
            .get(self.message_url())
            .bearer_auth(&self.access_token)
            .query(&self.query(text, context)?)
            .send()
            .await
            .map_err(|e| RecognizerError::Transport(format!("Wit.ai request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            RecognizerError::Transport(format!("Failed to read Wit.ai response: {}", e))
        })?;

        Self::parse_response(status, &body)
    }

    fn name(&self) -> &str {
        "wit"
    }
}
