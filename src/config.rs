// Configuration File Support
//
// Configuration file parsing for the quota engine.
// Supports TOML format with environment variable overrides.
// The CLI reads `quota.toml` from the working directory unless --config is given.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::quota::QuotaConfig;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "quota.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Quota configuration
    pub quota: QuotaConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `quota.toml` in the working directory
    pub fn load() -> Result<Self> {
        Self::load_from_path(Self::config_path())
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation. A missing file yields the default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default().apply_env_overrides());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        let config = config.apply_env_overrides();
        config.validate()?;

        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Default configuration file path
    pub fn config_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - QUOTA_ENABLED
    /// - QUOTA_LOG_LEVEL
    /// - QUOTA_LOG_FORMAT
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("QUOTA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("QUOTA_LOG_FORMAT") {
            self.logging.format = format;
        }

        self.quota = self.quota.apply_env_overrides();
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        for source in &self.quota.sources {
            if source.service.is_empty() {
                anyhow::bail!("Quota source has empty service name");
            }
        }
        for cmd in &self.quota.overrides {
            if cmd.target.is_empty() {
                anyhow::bail!("Quota override has empty target");
            }
        }

        self.quota
            .validate()
            .context("Invalid quota configuration")?;

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}
