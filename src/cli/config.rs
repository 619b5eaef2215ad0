//! Config and cache-key command handlers.

use anyhow::Result;

use wit_recognizer::cache::cache_key;
use wit_recognizer::config::redact_url;
use wit_recognizer::Config;

/// Print the cache key `text` maps to under the configured prefix.
pub(crate) fn cmd_cache_key(config: &Config, text: &str) -> Result<()> {
    let prefix = config.cache.as_ref().map(|c| c.prefix.as_str()).unwrap_or("");
    println!("{}", cache_key(prefix, text));
    Ok(())
}

/// Print the effective configuration.
pub(crate) fn cmd_config(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);
    Ok(())
}

fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if !shown.wit.access_token.is_empty() {
        shown.wit.access_token = "[REDACTED]".to_string();
    }
    if let Some(cache) = shown.cache.as_mut() {
        cache.url = cache.url.as_deref().map(redact_url);
    }
    shown
}
