// Structured logging setup
//
// Installs a tracing subscriber from the logging section of the config file.
// RUST_LOG still wins over the configured level when it is set.

use anyhow::{anyhow, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a format name (case-insensitive)
    pub fn parse(format: &str) -> Result<Self> {
        match format.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("Invalid log format: {}", other)),
        }
    }
}

/// Build the filter: RUST_LOG if present, else `level`
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber
///
/// `verbose` forces DEBUG regardless of the configured level.
///
/// # Errors
///
/// Fails on an unknown level or format, or when a global subscriber is
/// already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow!("Failed to parse log level: {}", e))?
    };
    let filter = env_filter(level);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match LogFormat::parse(&config.format)? {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}
