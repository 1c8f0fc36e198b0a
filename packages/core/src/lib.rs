//! PartGraph Core Read Layer
//!
//! This crate provides the read side of the PartGraph parts-traceability
//! system: filtered asset queries, component tree materialization, parent
//! resolution, KPI aggregates and report extraction over per-tenant asset
//! stores.
//!
//! # Architecture
//!
//! - **Per-tenant stores**: One embedded libsql database per organization,
//!   opened lazily and cached by a registry
//! - **Whitelist-compiled queries**: Caller filters compile against a fixed
//!   field registry; every value is a bound parameter
//! - **Iterative tree materialization**: Component trees are built by
//!   depth-bounded breadth-first expansion over the relationship table, not
//!   by recursive SQL
//!
//! # Modules
//!
//! - [`models`] - Data structures (AssetNode, Page, Relationship, schema registry)
//! - [`query`] - Filter sanitization and SQL compilation
//! - [`services`] - Business services (AssetQueryService, KpiService, ReportService)
//! - [`db`] - Per-tenant database layer with libsql integration
//! - [`config`] - Runtime configuration

pub mod config;
pub mod db;
pub mod models;
pub mod query;
pub mod services;

// Re-export commonly used types
pub use config::CoreConfig;
pub use models::*;
pub use query::*;
pub use services::*;
