//! Recognize command handler.

use anyhow::{Context, Result};
use tracing::info;

use wit_recognizer::{ClassifyContext, Config, RecognizeContext, WitRecognizer};

/// Classify `text` and print the result as pretty JSON.
pub(crate) async fn cmd_recognize(config: &Config, text: &str, raw: bool) -> Result<()> {
    let recognizer = WitRecognizer::from_config(config)
        .await
        .context("Failed to build recognizer")?;

    let output = if raw {
        let response = recognizer
            .classifier()
            .classify(text, &ClassifyContext::default())
            .await?;
        serde_json::to_string_pretty(&response)?
    } else {
        let result = recognizer
            .recognize(&RecognizeContext::from_text(text))
            .await?;
        serde_json::to_string_pretty(&result)?
    };
    println!("{}", output);

    if let Some(cache) = recognizer.cache() {
        let pending = cache.pending();
        if pending > 0 {
            info!(pending, "Waiting for cache writes");
        }
    }
    recognizer.flush().await;
    Ok(())
}
