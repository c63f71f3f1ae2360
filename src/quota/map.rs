//! Quota Map
//!
//! Tag-keyed map used both for limits and for usage counts. Writers may merge
//! into the same map concurrently, so the entries sit behind a lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::model::{Scope, Tag, Target, TargetSrv};
use crate::error::Result;

/// Thread-safe map from [`Tag`] to a limit or a usage count
///
/// Limit semantics: negative is unlimited, zero blocks the resource entirely,
/// positive is a hard ceiling. Iteration is in ascending tag order.
#[derive(Debug, Default)]
pub struct QuotaMap {
    entries: RwLock<BTreeMap<Tag, i64>>,
}

impl QuotaMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Tag, i64>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Tag, i64>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Value stored for `tag`
    pub fn get(&self, tag: &Tag) -> Option<i64> {
        self.read().get(tag).copied()
    }

    /// Insert or replace the value for `tag`
    pub fn set(&self, tag: Tag, value: i64) {
        self.write().insert(tag, value);
    }

    /// Copy every entry of `other` into this map, overwriting on collision
    pub fn merge(&self, other: &QuotaMap) {
        // Snapshot first so merging a map into itself cannot deadlock
        let incoming = other.snapshot();
        self.write().extend(incoming);
    }

    /// Snapshot of the entries in tag order
    pub fn iter(&self) -> impl Iterator<Item = (Tag, i64)> {
        self.snapshot().into_iter()
    }

    fn snapshot(&self) -> BTreeMap<Tag, i64> {
        self.read().clone()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the map holds no entries
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Distinct target names across all tags
    ///
    /// # Errors
    ///
    /// Fails on the first tag that does not decompose.
    pub fn targets(&self) -> Result<BTreeSet<Target>> {
        self.read().keys().map(Tag::target).collect()
    }

    /// Distinct owning services across all tags
    ///
    /// # Errors
    ///
    /// Fails on the first tag that does not decompose.
    pub fn services(&self) -> Result<BTreeSet<TargetSrv>> {
        self.read().keys().map(Tag::srv).collect()
    }

    /// Distinct scopes across all tags
    ///
    /// # Errors
    ///
    /// Fails on the first tag that does not decompose.
    pub fn scopes(&self) -> Result<BTreeSet<Scope>> {
        self.read().keys().map(Tag::scope).collect()
    }
}

impl Clone for QuotaMap {
    fn clone(&self) -> Self {
        Self {
            entries: RwLock::new(self.snapshot()),
        }
    }
}

impl FromIterator<(Tag, i64)> for QuotaMap {
    fn from_iter<I: IntoIterator<Item = (Tag, i64)>>(iter: I) -> Self {
        Self {
            entries: RwLock::new(iter.into_iter().collect()),
        }
    }
}
