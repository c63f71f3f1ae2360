// Prometheus metrics for quota decisions
//
// - Reached-check outcomes (counter by result)
// - Usage aggregation outcomes (counter by status)
// - Override updates (counter by status)
// - Registered usage reporters (gauge)

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref QUOTA_CHECKS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_checks_total", "Total number of quota reached checks"),
        &["result"]
    ).expect("Failed to create quota checks metric");

    pub static ref QUOTA_USAGE_AGGREGATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "quota_usage_aggregations_total",
            "Total number of usage aggregations across all reporters"
        ),
        &["status"]
    ).expect("Failed to create usage aggregations metric");

    pub static ref QUOTA_UPDATES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_updates_total", "Total number of quota override updates"),
        &["status"]
    ).expect("Failed to create quota updates metric");

    pub static ref QUOTA_REPORTERS_REGISTERED: IntGauge = IntGauge::new(
        "quota_reporters_registered",
        "Number of registered usage reporters"
    ).expect("Failed to create registered reporters metric");
}

/// Initialize metrics registry - must be called once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(QUOTA_CHECKS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUOTA_USAGE_AGGREGATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUOTA_UPDATES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(QUOTA_REPORTERS_REGISTERED.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

/// Record the outcome of a reached-check
pub fn record_check(result: &str) {
    QUOTA_CHECKS_TOTAL.with_label_values(&[result]).inc();
}

/// Record the outcome of a usage aggregation
pub fn record_aggregation(status: &str) {
    QUOTA_USAGE_AGGREGATIONS_TOTAL
        .with_label_values(&[status])
        .inc();
}

/// Record the outcome of an override update
pub fn record_update(status: &str) {
    QUOTA_UPDATES_TOTAL.with_label_values(&[status]).inc();
}
