//! Quota Store
//!
//! Persistence port for administrator overrides, plus the in-memory adapter
//! used by the CLI and the tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::map::QuotaMap;
use super::model::{Scope, ScopeParameters, Tag, UpdateQuotaCmd};
use crate::error::Result;

/// Storage for scope-specific limit overrides
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Overrides visible for `scope`: global ones, plus the org's when an org
    /// id is set, plus the user's when a user id is set
    async fn get(&self, scope: Option<ScopeParameters>) -> Result<QuotaMap>;

    /// Create or replace the override for `tag` described by `cmd`
    async fn update(&self, tag: &Tag, cmd: &UpdateQuotaCmd) -> Result<()>;

    /// Remove every user-scoped override belonging to `user_id`
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;
}

/// Key for identifying one stored override
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct OverrideKey {
    /// Tag the override replaces the default for
    pub tag: Tag,

    /// Scope of the override
    pub scope: Scope,

    /// Organization id (org scope), 0 otherwise
    pub org_id: i64,

    /// User id (user scope), 0 otherwise
    pub user_id: i64,
}

impl OverrideKey {
    /// Key for `tag` as addressed by `cmd`
    pub fn from_cmd(tag: Tag, cmd: &UpdateQuotaCmd) -> Self {
        let scope = cmd.scope();
        let (org_id, user_id) = match scope {
            Scope::Global => (0, 0),
            Scope::Org => (cmd.org_id, 0),
            Scope::User => (0, cmd.user_id),
        };
        Self {
            tag,
            scope,
            org_id,
            user_id,
        }
    }

    fn visible_for(&self, params: Option<&ScopeParameters>) -> bool {
        match (self.scope, params) {
            (Scope::Global, _) => true,
            (Scope::Org, Some(p)) => p.org_id != 0 && p.org_id == self.org_id,
            (Scope::User, Some(p)) => p.user_id != 0 && p.user_id == self.user_id,
            (_, None) => false,
        }
    }
}

/// In-memory override store
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuotaStore {
    overrides: Arc<RwLock<HashMap<OverrideKey, i64>>>,
}

impl InMemoryQuotaStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored overrides
    pub async fn count(&self) -> usize {
        self.overrides.read().await.len()
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn get(&self, scope: Option<ScopeParameters>) -> Result<QuotaMap> {
        let overrides = self.overrides.read().await;
        Ok(overrides
            .iter()
            .filter(|(key, _)| key.visible_for(scope.as_ref()))
            .map(|(key, limit)| (key.tag.clone(), *limit))
            .collect())
    }

    async fn update(&self, tag: &Tag, cmd: &UpdateQuotaCmd) -> Result<()> {
        let key = OverrideKey::from_cmd(tag.clone(), cmd);
        let mut overrides = self.overrides.write().await;
        overrides.insert(key, cmd.limit);
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        let mut overrides = self.overrides.write().await;
        overrides.retain(|key, _| !(key.scope == Scope::User && key.user_id == user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(scope: Scope) -> Tag {
        Tag::new(&"dashboards".into(), &"dashboard".into(), scope).unwrap()
    }

    fn cmd(limit: i64, org_id: i64, user_id: i64) -> UpdateQuotaCmd {
        UpdateQuotaCmd {
            target: "dashboard".to_string(),
            limit,
            org_id,
            user_id,
        }
    }

    #[tokio::test]
    async fn test_store_creation() {
        let store = InMemoryQuotaStore::new();
        assert_eq!(store.count().await, 0);
        assert!(store.get(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let store = InMemoryQuotaStore::new();
        store.update(&tag(Scope::Org), &cmd(5, 1, 0)).await.unwrap();
        store.update(&tag(Scope::Org), &cmd(7, 1, 0)).await.unwrap();

        assert_eq!(store.count().await, 1);
        let limits = store.get(Some(ScopeParameters::new(1, 0))).await.unwrap();
        assert_eq!(limits.get(&tag(Scope::Org)), Some(7));
    }

    #[tokio::test]
    async fn test_get_filters_by_scope() {
        let store = InMemoryQuotaStore::new();
        store.update(&tag(Scope::Global), &cmd(100, 0, 0)).await.unwrap();
        store.update(&tag(Scope::Org), &cmd(10, 1, 0)).await.unwrap();
        store.update(&tag(Scope::Org), &cmd(20, 2, 0)).await.unwrap();
        store.update(&tag(Scope::User), &cmd(3, 0, 5)).await.unwrap();

        let anonymous = store.get(None).await.unwrap();
        assert_eq!(anonymous.len(), 1);
        assert_eq!(anonymous.get(&tag(Scope::Global)), Some(100));

        let org2_user5 = store.get(Some(ScopeParameters::new(2, 5))).await.unwrap();
        assert_eq!(org2_user5.len(), 3);
        assert_eq!(org2_user5.get(&tag(Scope::Org)), Some(20));
        assert_eq!(org2_user5.get(&tag(Scope::User)), Some(3));

        let org3 = store.get(Some(ScopeParameters::new(3, 0))).await.unwrap();
        assert_eq!(org3.get(&tag(Scope::Org)), None);
    }

    #[tokio::test]
    async fn test_delete_by_user() {
        let store = InMemoryQuotaStore::new();
        store.update(&tag(Scope::User), &cmd(3, 0, 5)).await.unwrap();
        store.update(&tag(Scope::User), &cmd(4, 0, 6)).await.unwrap();
        store.update(&tag(Scope::Org), &cmd(10, 5, 0)).await.unwrap();

        store.delete_by_user(5).await.unwrap();

        assert_eq!(store.count().await, 2);
        let user5 = store.get(Some(ScopeParameters::new(0, 5))).await.unwrap();
        assert!(user5.get(&tag(Scope::User)).is_none());
        // org 5 is a different entity from user 5
        let org5 = store.get(Some(ScopeParameters::new(5, 0))).await.unwrap();
        assert_eq!(org5.get(&tag(Scope::Org)), Some(10));
    }
}
