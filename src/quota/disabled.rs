//! Disabled Quota Service
//!
//! Installed when quota enforcement is switched off. Every decision fails with
//! [`QuotaError::Disabled`]; registration is accepted and ignored so services
//! can register unconditionally at startup.

use async_trait::async_trait;

use super::model::{QuotaDto, ReqContext, ScopeParameters, UpdateQuotaCmd};
use super::reporter::NewUsageReporter;
use super::service::QuotaService;
use crate::error::{QuotaError, Result};

/// Quota service stub for disabled mode
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledQuotaService;

#[async_trait]
impl QuotaService for DisabledQuotaService {
    async fn quota_reached(&self, _ctx: Option<&ReqContext>, _target: &str) -> Result<bool> {
        Err(QuotaError::Disabled)
    }

    async fn check_quota_reached(
        &self,
        _target: &str,
        _scope: Option<ScopeParameters>,
    ) -> Result<bool> {
        Err(QuotaError::Disabled)
    }

    async fn get(&self, _scope: &str, _id: i64) -> Result<Vec<QuotaDto>> {
        Err(QuotaError::Disabled)
    }

    async fn update(&self, _cmd: &UpdateQuotaCmd) -> Result<()> {
        Err(QuotaError::Disabled)
    }

    async fn delete_by_user(&self, _user_id: i64) -> Result<()> {
        Err(QuotaError::Disabled)
    }

    async fn add_reporter(&self, _reporter: NewUsageReporter) -> Result<()> {
        Ok(())
    }
}
