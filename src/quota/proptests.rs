//! Property-Based Tests for the Reached-Check
//!
//! Random limit/usage tables are registered under a single service and the
//! decision is compared with a direct computation over the same table.
//!
//! ```bash
//! cargo test --lib quota::proptests
//! ```

use proptest::prelude::*;
use std::sync::Arc;

use super::manager::QuotaManager;
use super::map::QuotaMap;
use super::model::{Scope, ScopeParameters, Tag};
use super::reporter::{NewUsageReporter, StaticReporter};
use super::service::QuotaService;
use super::store::InMemoryQuotaStore;

fn tag(index: usize) -> Tag {
    Tag::new(&"alpha".into(), &format!("t{index}").into(), Scope::Global).unwrap()
}

fn check(limits: &[i64], usage: &[i64]) -> bool {
    let limit_map: QuotaMap = limits.iter().enumerate().map(|(i, l)| (tag(i), *l)).collect();
    let usage_map: QuotaMap = usage.iter().enumerate().map(|(i, u)| (tag(i), *u)).collect();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let manager = QuotaManager::new(Arc::new(InMemoryQuotaStore::new()));
        manager
            .add_reporter(NewUsageReporter::new(
                "alpha",
                limit_map,
                StaticReporter::new(usage_map),
            ))
            .await
            .unwrap();
        manager
            .check_quota_reached("alpha", Some(ScopeParameters::new(1, 1)))
            .await
            .unwrap()
    })
}

// Paired limit/usage tables of equal length
fn arb_table(limit: std::ops::Range<i64>) -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    (1usize..8).prop_flat_map(move |len| {
        (
            prop::collection::vec(limit.clone(), len),
            prop::collection::vec(0i64..2_000, len),
        )
    })
}

proptest! {
    /// Positive limits are reached exactly when some usage meets its ceiling
    #[test]
    fn prop_positive_limits_reached_iff_usage_at_ceiling((limits, usage) in arb_table(1..1_000)) {
        let expected = limits.iter().zip(&usage).any(|(l, u)| u >= l);
        prop_assert_eq!(check(&limits, &usage), expected);
    }

    /// A single zero limit blocks regardless of usage
    #[test]
    fn prop_zero_limit_always_reached(
        (mut limits, mut usage) in arb_table(-5..1_000),
        blocked in any::<prop::sample::Index>()
    ) {
        let i = blocked.index(limits.len());
        limits[i] = 0;
        usage[i] = 0;
        prop_assert!(check(&limits, &usage));
    }

    /// Unlimited tags are never reached
    #[test]
    fn prop_negative_limits_never_reached((limits, usage) in arb_table(-1_000..0)) {
        prop_assert!(!check(&limits, &usage));
    }
}
