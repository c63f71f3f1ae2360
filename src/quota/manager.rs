//! Quota Manager
//!
//! Central quota decision engine. Services register a usage reporter and
//! their default limits once at startup; at request time the manager resolves
//! effective limits (defaults replaced by stored overrides), asks reporters
//! for live usage and compares.

use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::map::QuotaMap;
use super::model::{
    QuotaDto, ReqContext, Scope, ScopeParameters, Tag, Target, TargetSrv, UpdateQuotaCmd,
};
use super::registry::ReporterRegistry;
use super::reporter::NewUsageReporter;
use super::service::QuotaService;
use super::store::QuotaStore;
use crate::error::{QuotaError, Result};
use crate::metrics;

/// Quota manager
pub struct QuotaManager {
    /// Override persistence
    store: Arc<dyn QuotaStore>,

    /// Usage reporters by owning service
    reporters: ReporterRegistry,

    /// Defaults contributed by every registered service
    default_limits: QuotaMap,
}

impl QuotaManager {
    /// Create a manager with no registered services
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self {
            store,
            reporters: ReporterRegistry::new(),
            default_limits: QuotaMap::new(),
        }
    }

    /// Defaults merged from every registration so far
    pub fn default_limits(&self) -> &QuotaMap {
        &self.default_limits
    }

    /// Effective limit per tag of `target_srv` for `scope`
    ///
    /// Only tags whose scope can be evaluated with `scope` are returned:
    /// global tags always, org tags with an org id, user tags with a user id.
    async fn get_overridden_limits(
        &self,
        target_srv: &TargetSrv,
        scope: Option<ScopeParameters>,
    ) -> Result<BTreeMap<Tag, i64>> {
        let custom_limits = self.store.get(scope).await?;

        let mut limits = BTreeMap::new();
        for (tag, default_limit) in self.default_limits.iter() {
            if &tag.srv()? != target_srv {
                continue;
            }
            if !ScopeParameters::applies_to(scope.as_ref(), tag.scope()?) {
                continue;
            }

            let limit = custom_limits.get(&tag).unwrap_or(default_limit);
            limits.insert(tag, limit);
        }

        Ok(limits)
    }

    /// Usage across every registered reporter
    ///
    /// One task per reporter. The first failure cancels the token handed to
    /// the others and becomes the result once every task has finished.
    async fn get_usage(&self, scope: Option<ScopeParameters>) -> Result<QuotaMap> {
        let usage = Arc::new(QuotaMap::new());
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for (target_srv, reporter) in self.reporters.snapshot().await {
            let usage = Arc::clone(&usage);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let partial = reporter.report(cancel.clone(), scope).await.map_err(|err| {
                    warn!(target_srv = %target_srv, error = %err, "Usage reporter failed");
                    err
                })?;
                if !cancel.is_cancelled() {
                    usage.merge(&partial);
                }
                Ok::<_, QuotaError>(())
            });
        }

        let mut first_err = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| QuotaError::Collaborator(anyhow!("usage reporter task failed: {}", e)))
                .and_then(|reported| reported);

            if let Err(err) = outcome {
                cancel.cancel();
                first_err.get_or_insert(err);
            }
        }

        if let Some(err) = first_err {
            metrics::record_aggregation("error");
            return Err(err);
        }

        metrics::record_aggregation("ok");
        Ok(Arc::try_unwrap(usage).unwrap_or_else(|shared| (*shared).clone()))
    }

    async fn evaluate(&self, target: &str, scope: Option<ScopeParameters>) -> Result<bool> {
        let target_srv = TargetSrv::new(target);
        let limits = self.get_overridden_limits(&target_srv, scope).await?;

        let reporter = self
            .reporters
            .get(&target_srv)
            .await
            .ok_or_else(|| QuotaError::InvalidTargetSrv(target.to_string()))?;
        let usage = reporter.report(CancellationToken::new(), scope).await?;

        // Tags are scanned in ascending order; a reached tag wins over a tag
        // with missing usage.
        let mut missing = None;
        for (tag, limit) in limits {
            if limit < 0 {
                continue;
            }
            if limit == 0 {
                debug!(tag = %tag, "Quota blocked by zero limit");
                return Ok(true);
            }
            match usage.get(&tag) {
                Some(used) if used >= limit => {
                    debug!(tag = %tag, used, limit, "Quota reached");
                    return Ok(true);
                }
                Some(_) => {}
                None => {
                    missing.get_or_insert(tag);
                }
            }
        }

        match missing {
            Some(tag) => Err(QuotaError::UsageUnavailable(tag)),
            None => Ok(false),
        }
    }

    /// Find the default-limit tag an update command addresses
    fn tag_for_update(&self, cmd: &UpdateQuotaCmd) -> Result<Tag> {
        let target = Target::new(cmd.target.as_str());
        if !self.default_limits.targets()?.contains(&target) {
            return Err(QuotaError::InvalidTarget(format!(
                "unknown quota target: {}",
                cmd.target
            )));
        }

        let scope = cmd.scope();
        let mut matches = Vec::new();
        for (tag, _) in self.default_limits.iter() {
            if tag.target()? == target && tag.scope()? == scope {
                matches.push(tag);
            }
        }

        // A target name shared by several services cannot be addressed by name alone
        match matches.len() {
            0 => Err(QuotaError::InvalidTarget(format!(
                "quota target {} has no {} limit",
                cmd.target, scope
            ))),
            1 => Ok(matches.remove(0)),
            _ => {
                let services = matches
                    .iter()
                    .map(|tag| tag.srv().map(|srv| srv.to_string()))
                    .collect::<Result<Vec<_>>>()?;
                Err(QuotaError::InvalidTarget(format!(
                    "quota target {} is ambiguous for {} scope: contributed by {}",
                    cmd.target,
                    scope,
                    services.join(", ")
                )))
            }
        }
    }
}

#[async_trait]
impl QuotaService for QuotaManager {
    async fn quota_reached(&self, ctx: Option<&ReqContext>, target: &str) -> Result<bool> {
        // No request context means a background caller; those are never blocked
        let Some(ctx) = ctx else {
            debug!(quota_target = target, "No request context, skipping quota check");
            return Ok(false);
        };

        self.check_quota_reached(target, ctx.scope_parameters()).await
    }

    async fn check_quota_reached(
        &self,
        target: &str,
        scope: Option<ScopeParameters>,
    ) -> Result<bool> {
        let result = self.evaluate(target, scope).await;
        match &result {
            Ok(true) => metrics::record_check("reached"),
            Ok(false) => metrics::record_check("not_reached"),
            Err(err) => {
                warn!(quota_target = target, error = %err, "Quota check failed");
                metrics::record_check("error");
            }
        }
        result
    }

    async fn get(&self, scope: &str, id: i64) -> Result<Vec<QuotaDto>> {
        let quota_scope: Scope = scope.parse()?;
        let params = ScopeParameters::for_scope(quota_scope, id);

        let custom_limits = self.store.get(Some(params)).await?;
        let usage = self.get_usage(Some(params)).await?;

        let mut quotas = Vec::new();
        for (tag, default_limit) in self.default_limits.iter() {
            if tag.scope()? != quota_scope {
                continue;
            }

            quotas.push(QuotaDto {
                target: tag.target()?.to_string(),
                limit: custom_limits.get(&tag).unwrap_or(default_limit),
                org_id: params.org_id,
                user_id: params.user_id,
                used: usage.get(&tag).unwrap_or(0),
                service: tag.srv()?.to_string(),
                scope: quota_scope,
            });
        }

        Ok(quotas)
    }

    async fn update(&self, cmd: &UpdateQuotaCmd) -> Result<()> {
        let tag = match self.tag_for_update(cmd) {
            Ok(tag) => tag,
            Err(err) => {
                metrics::record_update("rejected");
                return Err(err);
            }
        };

        let result = self.store.update(&tag, cmd).await;
        match &result {
            Ok(()) => {
                info!(tag = %tag, limit = cmd.limit, org_id = cmd.org_id, user_id = cmd.user_id, "Quota override updated");
                metrics::record_update("ok");
            }
            Err(err) => {
                warn!(tag = %tag, error = %err, "Quota override update failed");
                metrics::record_update("error");
            }
        }
        result
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        self.store.delete_by_user(user_id).await
    }

    async fn add_reporter(&self, new: NewUsageReporter) -> Result<()> {
        for (tag, _) in new.default_limits.iter() {
            // Every default must decompose into service, target and scope
            tag.target()?;
            tag.scope()?;
            if tag.srv()? != new.target_srv {
                return Err(QuotaError::InvalidTag(format!(
                    "{} is not owned by {}",
                    tag, new.target_srv
                )));
            }
        }

        let NewUsageReporter {
            target_srv,
            default_limits,
            reporter,
        } = new;
        let limit_count = default_limits.len();

        self.reporters
            .register_with(target_srv.clone(), reporter, || {
                self.default_limits.merge(&default_limits)
            })
            .await?;

        metrics::QUOTA_REPORTERS_REGISTERED.inc();
        info!(target_srv = %target_srv, limits = limit_count, "Registered usage reporter");
        Ok(())
    }
}

impl std::fmt::Debug for QuotaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaManager")
            .field("reporters", &self.reporters)
            .field("default_limits", &self.default_limits)
            .finish_non_exhaustive()
    }
}
