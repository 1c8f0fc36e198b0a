//! Business Services
//!
//! This module contains the core business logic services:
//!
//! - `AssetQueryService` - Filtered asset queries, tree materialization and
//!   parent resolution
//! - `KpiService` - Aggregate statistics over a tenant's asset store
//! - `ReportService` - Row collection for downloadable asset reports
//!
//! Services coordinate between the per-tenant database layer and the query
//! compiler, implementing the read-side business rules.

pub mod asset_service;
pub mod error;
pub mod kpi_service;
pub mod report_service;

mod tree;

pub use asset_service::AssetQueryService;
pub use error::QueryServiceError;
pub use kpi_service::{
    AssetCounts, AssetsPerDay, KpiService, KpiStats, ManufacturerCountryCount, QualityCounts,
};
pub use report_service::{assets_with_subcomponents, ReportData, ReportKind, ReportService};
