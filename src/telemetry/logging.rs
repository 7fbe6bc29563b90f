//! Logging setup for the CLI
//!
//! `RUST_LOG` wins over the `[log]` section of the network file. Logs go to
//! stderr so trace output on stdout stays machine-readable.

use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// `[log]` section of the network file
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// error, warn, info, debug or trace
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_logging(config: Option<&LogConfig>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = config.map_or(Level::INFO, |c| parse_level(&c.level));
        EnvFilter::new(level.as_str())
    };

    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    let _ = match config.map(|c| c.format).unwrap_or_default() {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Pretty => registry.with(layer).try_init(),
    };
}

fn parse_level(level: &str) -> Level {
    level.parse().unwrap_or(Level::INFO)
}
