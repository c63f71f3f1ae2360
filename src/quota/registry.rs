//! Reporter Registry
//!
//! Maps each service to its usage reporter. Registration happens once per
//! service during startup; lookups happen on every quota check, so readers
//! share the lock and only registration takes it exclusively.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::model::TargetSrv;
use super::reporter::UsageReporter;
use crate::error::{QuotaError, Result};

/// Registered reporters keyed by owning service
#[derive(Default)]
pub struct ReporterRegistry {
    reporters: RwLock<HashMap<TargetSrv, Arc<dyn UsageReporter>>>,
}

impl ReporterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `reporter` for `target_srv`
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::TargetSrvConflict`] if the service already has a
    /// reporter. The existing reporter is kept.
    pub async fn register(
        &self,
        target_srv: TargetSrv,
        reporter: Arc<dyn UsageReporter>,
    ) -> Result<()> {
        self.register_with(target_srv, reporter, || ()).await
    }

    /// Register `reporter` and run `on_insert` before the write lock is
    /// released
    ///
    /// `on_insert` only runs when the registration succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`QuotaError::TargetSrvConflict`] if the service already has a
    /// reporter.
    pub async fn register_with<F>(
        &self,
        target_srv: TargetSrv,
        reporter: Arc<dyn UsageReporter>,
        on_insert: F,
    ) -> Result<()>
    where
        F: FnOnce() + Send,
    {
        let mut reporters = self.reporters.write().await;
        if reporters.contains_key(&target_srv) {
            return Err(QuotaError::TargetSrvConflict(format!(
                "target service: {} already exists",
                target_srv
            )));
        }
        reporters.insert(target_srv, reporter);
        on_insert();
        Ok(())
    }

    /// Reporter registered for `target_srv`
    pub async fn get(&self, target_srv: &TargetSrv) -> Option<Arc<dyn UsageReporter>> {
        self.reporters.read().await.get(target_srv).cloned()
    }

    /// Copy of the current registrations
    ///
    /// The read lock is released before the caller iterates.
    pub async fn snapshot(&self) -> Vec<(TargetSrv, Arc<dyn UsageReporter>)> {
        self.reporters
            .read()
            .await
            .iter()
            .map(|(srv, reporter)| (srv.clone(), Arc::clone(reporter)))
            .collect()
    }

    /// Number of registered services
    pub async fn len(&self) -> usize {
        self.reporters.read().await.len()
    }

    /// Whether no service has registered yet
    pub async fn is_empty(&self) -> bool {
        self.reporters.read().await.is_empty()
    }
}

impl std::fmt::Debug for ReporterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReporterRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::map::QuotaMap;
    use crate::quota::model::{Scope, Tag};
    use crate::quota::reporter::StaticReporter;
    use tokio_util::sync::CancellationToken;

    fn reporter_with(value: i64) -> Arc<dyn UsageReporter> {
        let tag = Tag::new(&"srv".into(), &"x".into(), Scope::Global).unwrap();
        Arc::new(StaticReporter::new([(tag, value)].into_iter().collect::<QuotaMap>()))
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let registry = ReporterRegistry::new();
        assert!(registry.is_empty().await);

        registry
            .register(TargetSrv::new("srv"), reporter_with(1))
            .await
            .unwrap();

        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&TargetSrv::new("srv")).await.is_some());
        assert!(registry.get(&TargetSrv::new("other")).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let registry = ReporterRegistry::new();
        registry
            .register(TargetSrv::new("srv"), reporter_with(1))
            .await
            .unwrap();

        let err = registry
            .register(TargetSrv::new("srv"), reporter_with(2))
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::TargetSrvConflict(_)));

        let reporter = registry.get(&TargetSrv::new("srv")).await.unwrap();
        let usage = reporter.report(CancellationToken::new(), None).await.unwrap();
        assert_eq!(usage.iter().next().map(|(_, v)| v), Some(1));
    }

    #[tokio::test]
    async fn test_snapshot_releases_lock() {
        let registry = Arc::new(ReporterRegistry::new());
        registry
            .register(TargetSrv::new("a"), reporter_with(1))
            .await
            .unwrap();

        let snapshot = registry.snapshot().await;

        // A registration while the snapshot is alive must not block
        registry
            .register(TargetSrv::new("b"), reporter_with(2))
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_registration() {
        let registry = Arc::new(ReporterRegistry::new());
        let mut handles = vec![];

        for i in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                // every service id registered twice; exactly one wins
                registry
                    .register(TargetSrv::new(format!("srv-{}", i % 8)), reporter_with(i))
                    .await
                    .is_ok()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }

        assert_eq!(wins, 8);
        assert_eq!(registry.len().await, 8);
    }
}
