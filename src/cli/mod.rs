//! Command-line interface.

mod config;
mod recognize;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use wit_recognizer::Config;

/// Query Wit.ai through the recognizer and its response cache.
#[derive(Debug, Parser)]
#[command(name = "wit-recognizer", version, about)]
pub(crate) struct Cli {
    /// Config file (default: ~/.wit-recognizer/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Recognize intent and entities of TEXT
    Recognize {
        text: String,
        /// Print the raw Wit.ai response instead of the normalized result
        #[arg(long)]
        raw: bool,
    },
    /// Print the cache key TEXT maps to
    CacheKey { text: String },
    /// Print the effective configuration (token redacted)
    Config,
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub(crate) fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wit_recognizer=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Load config from `--config` or the default location, with env overrides.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::load().context("Failed to load config")?,
    };
    Ok(config)
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Recognize { text, raw } => recognize::cmd_recognize(&config, &text, raw).await,
        Commands::CacheKey { text } => config::cmd_cache_key(&config, &text),
        Commands::Config => config::cmd_config(&config),
    }
}

impl Cli {
    pub(crate) fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recognize() {
        let cli = Cli::try_parse_from(["wit-recognizer", "recognize", "hello there", "--raw"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Recognize { ref text, raw: true } if text == "hello there"
        ));
        assert_eq!(cli.log_format(), LogFormat::Text);
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "wit-recognizer",
            "--log-format",
            "json",
            "cache-key",
            "hi",
            "--config",
            "/tmp/cfg.json",
        ])
        .unwrap();
        assert_eq!(cli.log_format(), LogFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cfg.json")));
        assert!(matches!(cli.command, Commands::CacheKey { ref text } if text == "hi"));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["wit-recognizer"]).is_err());
    }
}
