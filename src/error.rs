//! Quota Error Types
//!
//! Every failure the quota engine can surface. Callers branch on the variant,
//! never on the message text.

use crate::quota::Tag;

/// Error types for quota operations
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    /// Quota enforcement is turned off by configuration
    #[error("Quota is disabled")]
    Disabled,

    /// Scope kind is not one of global, org or user
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    /// Target is not contributed by any registered service
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// No reporter is registered for the target service
    #[error("Invalid target service: {0}")]
    InvalidTargetSrv(String),

    /// The target service already registered a reporter
    #[error("Target service conflict: {0}")]
    TargetSrvConflict(String),

    /// A reporter omitted a tag the reached-check needed
    #[error("No usage reported for tag: {0}")]
    UsageUnavailable(Tag),

    /// Tag does not decompose into service, target and scope
    #[error("Invalid tag format: {0}")]
    InvalidTag(String),

    /// A persistence or reporter call failed
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

/// Result alias used across the quota engine
pub type Result<T> = std::result::Result<T, QuotaError>;
