//! Report Data Service
//!
//! Collects the row set behind downloadable asset reports. Rendering to a
//! concrete file format happens upstream; this service owns the data shape
//! shared by every format of the same report family: the filtered asset
//! trees, the stable total, the subcomponent tally, and the file stem the
//! download should carry.
//!
//! Report extraction bypasses pagination, so the row count is checked
//! against the configured cap before the result leaves the service.

use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::AssetNode;
use crate::query::{AssetFilter, ValidationError};
use crate::services::asset_service::AssetQueryService;
use crate::services::error::QueryServiceError;

/// Report family, independent of the rendered file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportKind {
    /// Full asset listing with component trees.
    ListData,
    /// Customs declaration extract.
    Customs,
}

impl ReportKind {
    /// File stem the download carries, before the date prefix.
    pub fn stem(&self) -> &'static str {
        match self {
            ReportKind::ListData => "PartGraphReport",
            ReportKind::Customs => "PartGraphCustomsReport",
        }
    }
}

impl FromStr for ReportKind {
    type Err = ValidationError;

    /// Parse a requested report type, accepting the per-format aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "listData" | "listDataPlainCSV" | "listDataExcel" => Ok(ReportKind::ListData),
            "customsReport" | "customsReportCSV" | "customsReportExcel" => Ok(ReportKind::Customs),
            other => Err(ValidationError::UnknownReportKind(other.to_string())),
        }
    }
}

/// The collected rows and metadata for one report download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub kind: ReportKind,
    /// Date-prefixed name the rendered file should carry, without extension.
    pub file_stem: String,
    pub result_length: u64,
    pub assets_with_subcomponents: u64,
    pub data: Vec<AssetNode>,
}

/// Collects report row sets from the asset query engine.
#[derive(Debug, Clone)]
pub struct ReportService {
    assets: AssetQueryService,
}

impl ReportService {
    /// Create a service over the given asset query engine.
    pub fn new(assets: AssetQueryService) -> Self {
        Self { assets }
    }

    /// Collect all assets matching `filter` for a report download.
    ///
    /// Runs unpaginated at the configured report tree depth. Fails with a
    /// capacity error when the match count exceeds the extraction cap, and
    /// strips the owner attribute from every row before handing the set to
    /// the renderer.
    pub async fn collect_report_data(
        &self,
        filter: &AssetFilter,
        tenant_id: &str,
        kind: ReportKind,
    ) -> Result<ReportData, QueryServiceError> {
        tracing::info!("[{}] Collecting {:?} report data", tenant_id, kind);

        let config = self.assets.config();
        let page = self
            .assets
            .list_nodes(filter, None, config.report_child_depth, tenant_id, 0)
            .await?;

        if page.data.len() > config.report_asset_cap {
            return Err(QueryServiceError::capacity_exceeded(
                page.data.len(),
                config.report_asset_cap,
            ));
        }

        let assets_with_subcomponents = assets_with_subcomponents(&page.data);
        let mut data = page.data;
        for asset in &mut data {
            asset.attributes.remove(crate::models::schema::MSPID_FIELD);
        }

        Ok(ReportData {
            kind,
            file_stem: format!("{}_{}", Utc::now().format("%Y%m%d"), kind.stem()),
            result_length: page.result_length,
            assets_with_subcomponents,
            data,
        })
    }
}

/// Count the assets that have at least one child carrying components of
/// its own.
pub fn assets_with_subcomponents(assets: &[AssetNode]) -> u64 {
    assets
        .iter()
        .filter(|asset| {
            asset
                .children()
                .iter()
                .any(|child| !child.components().is_empty())
        })
        .count() as u64
}
