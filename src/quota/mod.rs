//! Quota Decision Module
//!
//! Multi-tenant usage ceilings for resources owned by independent services.
//! Each service registers a usage reporter and its default limits once at
//! startup; the manager answers "is this caller at its limit?" per target and
//! scope (global, organization, user).
//!
//! # Features
//!
//! - Default limits merged from every registration into one map
//! - Administrator overrides substituted per scope at resolution time
//! - Concurrent usage aggregation across reporters with fail-fast cancellation
//! - Disabled-mode stub behind the same trait
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Quota Manager                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │  │ Limit       │  │ Usage       │  │ Reporter    │         │
//! │  │ Resolver    │  │ Aggregator  │  │ Registry    │         │
//! │  └─────────────┘  └─────────────┘  └─────────────┘         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │              Quota Store (override persistence)      │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod disabled;
pub mod manager;
pub mod map;
pub mod model;
pub mod registry;
pub mod reporter;
pub mod service;
pub mod store;

// Property-based tests module
#[cfg(test)]
mod proptests;

pub use config::{LimitEntry, QuotaConfig, SourceConfig, UsageEntry};
pub use disabled::DisabledQuotaService;
pub use manager::QuotaManager;
pub use map::QuotaMap;
pub use model::{
    QuotaDto, ReqContext, Scope, ScopeParameters, Tag, Target, TargetSrv, UpdateQuotaCmd,
};
pub use registry::ReporterRegistry;
pub use reporter::{NewUsageReporter, StaticReporter, UsageReporter};
pub use service::{provide_service, QuotaService};
pub use store::{InMemoryQuotaStore, QuotaStore};
