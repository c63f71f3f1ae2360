//! Quota Configuration
//!
//! The enforcement toggle, plus statically declared usage sources and seed
//! overrides used when the engine runs from a policy file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use super::map::QuotaMap;
use super::model::{Scope, Tag, Target, TargetSrv, UpdateQuotaCmd};
use super::reporter::{NewUsageReporter, StaticReporter};
use crate::error::{QuotaError, Result};

/// Environment variable that toggles enforcement
pub const ENV_QUOTA_ENABLED: &str = "QUOTA_ENABLED";

/// Quota configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Enable quota enforcement
    pub enabled: bool,

    /// Services with fixed usage snapshots
    pub sources: Vec<SourceConfig>,

    /// Overrides loaded into the store at startup
    pub overrides: Vec<UpdateQuotaCmd>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

impl QuotaConfig {
    /// Apply `QUOTA_ENABLED` on top of this configuration
    pub fn apply_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var(ENV_QUOTA_ENABLED) {
            match parse_flag(&val) {
                Some(enabled) => self.enabled = enabled,
                None => warn!(
                    value = %val,
                    enabled = self.enabled,
                    "Ignoring unparseable {}", ENV_QUOTA_ENABLED
                ),
            }
        }
        self
    }

    /// Disable quota enforcement (for testing)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Validate declared sources
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::InvalidTag`] for empty or separator-bearing
    /// names and [`QuotaError::TargetSrvConflict`] for a service declared twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.service.as_str()) {
                return Err(QuotaError::TargetSrvConflict(format!(
                    "service {} declared more than once",
                    source.service
                )));
            }
            source.default_limits()?;
            source.usage()?;
        }
        Ok(())
    }

    /// Registrations for every declared source
    pub fn registrations(&self) -> Result<Vec<NewUsageReporter>> {
        self.sources.iter().map(SourceConfig::registration).collect()
    }
}

/// Parse a boolean toggle: true/false, 1/0, yes/no, on/off (case-insensitive)
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// A service whose usage is fixed in configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Owning service name
    pub service: String,

    /// Default limits the service contributes
    pub limits: Vec<LimitEntry>,

    /// Usage the service reports for every scope
    pub usage: Vec<UsageEntry>,
}

/// One default limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitEntry {
    /// Target resource
    pub target: String,
    /// Scope kind
    pub scope: Scope,
    /// Limit (negative unlimited, zero blocked)
    pub limit: i64,
}

/// One usage count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    /// Target resource
    pub target: String,
    /// Scope kind
    pub scope: Scope,
    /// Current usage
    pub used: i64,
}

impl SourceConfig {
    fn tag(&self, target: &str, scope: Scope) -> Result<Tag> {
        Tag::new(
            &TargetSrv::new(self.service.as_str()),
            &Target::new(target),
            scope,
        )
    }

    /// Default limits as a map
    pub fn default_limits(&self) -> Result<QuotaMap> {
        self.limits
            .iter()
            .map(|entry| Ok((self.tag(&entry.target, entry.scope)?, entry.limit)))
            .collect()
    }

    /// Usage snapshot as a map
    pub fn usage(&self) -> Result<QuotaMap> {
        self.usage
            .iter()
            .map(|entry| Ok((self.tag(&entry.target, entry.scope)?, entry.used)))
            .collect()
    }

    /// Registration backed by a [`StaticReporter`]
    pub fn registration(&self) -> Result<NewUsageReporter> {
        Ok(NewUsageReporter::new(
            self.service.as_str(),
            self.default_limits()?,
            StaticReporter::new(self.usage()?),
        ))
    }
}
