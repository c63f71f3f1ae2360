//! Quota Service
//!
//! The contract callers program against. [`provide_service`] picks the real
//! engine or the disabled stub from configuration, so callers never need to
//! know which one they hold.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::config::QuotaConfig;
use super::disabled::DisabledQuotaService;
use super::manager::QuotaManager;
use super::model::{QuotaDto, ReqContext, ScopeParameters, UpdateQuotaCmd};
use super::reporter::NewUsageReporter;
use super::store::QuotaStore;
use crate::error::Result;

/// Quota decision surface
#[async_trait]
pub trait QuotaService: Send + Sync {
    /// Whether `target` is at its limit for the caller behind `ctx`
    ///
    /// A missing context (background jobs, system callers) is never blocked
    /// and always yields `Ok(false)`. Signed-in callers are checked with their
    /// org and user; anonymous callers against global limits only. Any error
    /// means "unable to determine" and must not be treated as "not reached".
    async fn quota_reached(&self, ctx: Option<&ReqContext>, target: &str) -> Result<bool>;

    /// Whether service `target` is at any applicable limit for `scope`
    ///
    /// With `scope` unset only global limits are checked.
    async fn check_quota_reached(
        &self,
        target: &str,
        scope: Option<ScopeParameters>,
    ) -> Result<bool>;

    /// Every limit of `scope` with its current usage, for org/user `id`
    async fn get(&self, scope: &str, id: i64) -> Result<Vec<QuotaDto>>;

    /// Store an override for a known target
    async fn update(&self, cmd: &UpdateQuotaCmd) -> Result<()>;

    /// Drop every user-scoped override of `user_id`
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Register a service's usage reporter and default limits
    async fn add_reporter(&self, reporter: NewUsageReporter) -> Result<()>;
}

/// Build the quota service for `config`
pub fn provide_service(config: &QuotaConfig, store: Arc<dyn QuotaStore>) -> Arc<dyn QuotaService> {
    if !config.enabled {
        info!("Quota enforcement disabled");
        return Arc::new(DisabledQuotaService);
    }

    Arc::new(QuotaManager::new(store))
}
