//! Usage Reporters
//!
//! A subsystem plugs into the engine by handing over a [`UsageReporter`] and
//! its default limits in a [`NewUsageReporter`]. Any async closure of the
//! right shape is a reporter.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::map::QuotaMap;
use super::model::{ScopeParameters, TargetSrv};
use crate::error::Result;

/// Capability that produces current usage counts for one service
///
/// The token is cancelled when a sibling reporter failed during aggregation.
/// Honouring it is optional; results produced after cancellation are
/// discarded.
#[async_trait]
pub trait UsageReporter: Send + Sync {
    /// Report usage for every tag the service owns that applies to `scope`
    async fn report(
        &self,
        cancel: CancellationToken,
        scope: Option<ScopeParameters>,
    ) -> Result<QuotaMap>;
}

#[async_trait]
impl<F, Fut> UsageReporter for F
where
    F: Fn(CancellationToken, Option<ScopeParameters>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<QuotaMap>> + Send + 'static,
{
    async fn report(
        &self,
        cancel: CancellationToken,
        scope: Option<ScopeParameters>,
    ) -> Result<QuotaMap> {
        (self)(cancel, scope).await
    }
}

/// Reporter that always returns the same usage snapshot
#[derive(Debug, Clone, Default)]
pub struct StaticReporter {
    usage: QuotaMap,
}

impl StaticReporter {
    /// Create a reporter around a fixed snapshot
    pub fn new(usage: QuotaMap) -> Self {
        Self { usage }
    }
}

#[async_trait]
impl UsageReporter for StaticReporter {
    async fn report(
        &self,
        _cancel: CancellationToken,
        _scope: Option<ScopeParameters>,
    ) -> Result<QuotaMap> {
        Ok(self.usage.clone())
    }
}

/// Registration handed to the engine by a subsystem at startup
#[derive(Clone)]
pub struct NewUsageReporter {
    /// Service that owns the reporter and the limits
    pub target_srv: TargetSrv,
    /// Limits that apply when no override exists
    pub default_limits: QuotaMap,
    /// Usage capability
    pub reporter: Arc<dyn UsageReporter>,
}

impl NewUsageReporter {
    /// Bundle a registration
    pub fn new(
        target_srv: impl Into<TargetSrv>,
        default_limits: QuotaMap,
        reporter: impl UsageReporter + 'static,
    ) -> Self {
        Self {
            target_srv: target_srv.into(),
            default_limits,
            reporter: Arc::new(reporter),
        }
    }
}

impl std::fmt::Debug for NewUsageReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUsageReporter")
            .field("target_srv", &self.target_srv)
            .field("default_limits", &self.default_limits)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuotaError;
    use crate::quota::model::{Scope, Tag};

    #[tokio::test]
    async fn test_static_reporter() {
        let tag = Tag::new(&"a".into(), &"x".into(), Scope::Global).unwrap();
        let usage: QuotaMap = [(tag.clone(), 4)].into_iter().collect();
        let reporter = StaticReporter::new(usage);

        let reported = reporter
            .report(CancellationToken::new(), None)
            .await
            .unwrap();
        assert_eq!(reported.get(&tag), Some(4));
    }

    #[tokio::test]
    async fn test_closure_reporter_sees_scope() {
        let reporter = |_cancel: CancellationToken, scope: Option<ScopeParameters>| async move {
            let tag = Tag::new(&"a".into(), &"x".into(), Scope::Org).unwrap();
            let used = scope.map(|s| s.org_id).unwrap_or_default();
            Ok::<_, QuotaError>([(tag, used)].into_iter().collect::<QuotaMap>())
        };

        let reported = reporter
            .report(CancellationToken::new(), Some(ScopeParameters::new(42, 0)))
            .await
            .unwrap();
        assert_eq!(reported.iter().next().map(|(_, v)| v), Some(42));
    }
}
