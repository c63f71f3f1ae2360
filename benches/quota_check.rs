// Quota Check Benchmarks (Criterion)
//
// Key metrics measured:
// - Reached-check latency as the number of tags per service grows
// - Usage aggregation latency as the number of registered services grows
//
// Usage:
//   cargo bench --bench quota_check

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use quota_engine::quota::{
    InMemoryQuotaStore, NewUsageReporter, QuotaManager, QuotaMap, QuotaService, Scope,
    ScopeParameters, StaticReporter, Tag,
};
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

/// Register `services` services with `tags` org-scoped tags each, all below their limit
fn manager(rt: &Runtime, services: usize, tags: usize) -> QuotaManager {
    let manager = QuotaManager::new(Arc::new(InMemoryQuotaStore::new()));

    rt.block_on(async {
        for s in 0..services {
            let srv = format!("svc{s}");
            let limits = QuotaMap::new();
            let usage = QuotaMap::new();
            for t in 0..tags {
                let tag = Tag::new(&srv.as_str().into(), &format!("t{t}").into(), Scope::Org)
                    .expect("valid tag");
                limits.set(tag.clone(), 1_000);
                usage.set(tag, t as i64);
            }
            manager
                .add_reporter(NewUsageReporter::new(
                    srv.clone(),
                    limits,
                    StaticReporter::new(usage),
                ))
                .await
                .expect("registration");
        }
    });

    manager
}

/// Benchmark: single-service reached-check
fn bench_check_quota_reached(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("check_quota_reached");
    let scope = Some(ScopeParameters::new(1, 1));

    for tags in [1usize, 10, 100].iter() {
        let manager = manager(&rt, 4, *tags);
        group.bench_with_input(BenchmarkId::from_parameter(tags), tags, |b, _| {
            b.iter(|| {
                let reached = rt
                    .block_on(manager.check_quota_reached("svc0", scope))
                    .expect("check");
                black_box(reached);
            });
        });
    }

    group.finish();
}

/// Benchmark: listing, which aggregates usage across every service
fn bench_listing(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("list_org_quotas");

    for services in [1usize, 8, 32].iter() {
        let manager = manager(&rt, *services, 10);
        group.bench_with_input(BenchmarkId::from_parameter(services), services, |b, _| {
            b.iter(|| {
                let rows = rt.block_on(manager.get("org", 1)).expect("listing");
                black_box(rows);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_check_quota_reached, bench_listing);
criterion_main!(benches);
