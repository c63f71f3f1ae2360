//! Quota Engine Library
//!
//! Multi-tenant quota decisions for resources owned by independently
//! developed services: default limits, per-scope overrides, concurrent usage
//! aggregation and the reached-check.

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod quota;

pub use error::{QuotaError, Result};
pub use quota::{provide_service, QuotaManager, QuotaService};
