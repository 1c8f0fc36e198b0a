//! Core Configuration
//!
//! Runtime knobs for the query layer. Everything here is resolved by the
//! embedding application, not by callers of the query API: callers choose a
//! tree depth or a page number, but the page size, depth defaults and the
//! extraction cap come from this struct.
//!
//! `from_env` reads `PARTGRAPH_*` variables and falls back to the defaults
//! below, so a bare environment yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default page size for list queries.
pub const DEFAULT_PAGINATION_LIMIT: u32 = 25;

/// Default child depth for single-asset detail queries.
pub const DEFAULT_DETAIL_CHILD_DEPTH: u32 = 2;

/// Default child depth for list queries.
pub const DEFAULT_LIST_CHILD_DEPTH: u32 = 2;

/// Default child depth for report extraction.
pub const DEFAULT_REPORT_CHILD_DEPTH: u32 = 2;

/// Hard ceiling on tree depth, whatever a caller asks for.
pub const MAX_TREE_DEPTH: u32 = 8;

/// Default cap on assets extracted into a single report.
pub const DEFAULT_REPORT_ASSET_CAP: usize = 25_000;

/// Configuration for the PartGraph core services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding the per-tenant database files
    pub data_dir: PathBuf,

    /// Page size for paginated list queries
    pub pagination_limit: u32,

    /// Default child depth for detail queries
    pub detail_child_depth: u32,

    /// Default child depth for list queries
    pub list_child_depth: u32,

    /// Child depth used when extracting report data
    pub report_child_depth: u32,

    /// Maximum number of assets a single report may extract
    pub report_asset_cap: usize,

    /// Optional per-query deadline in milliseconds; `None` disables it
    pub query_timeout_ms: Option<u64>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            pagination_limit: DEFAULT_PAGINATION_LIMIT,
            detail_child_depth: DEFAULT_DETAIL_CHILD_DEPTH,
            list_child_depth: DEFAULT_LIST_CHILD_DEPTH,
            report_child_depth: DEFAULT_REPORT_CHILD_DEPTH,
            report_asset_cap: DEFAULT_REPORT_ASSET_CAP,
            query_timeout_ms: None,
        }
    }
}

impl CoreConfig {
    /// Build a configuration from `PARTGRAPH_*` environment variables,
    /// falling back to the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("PARTGRAPH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            pagination_limit: env_u32("PARTGRAPH_PAGINATION_LIMIT", defaults.pagination_limit),
            detail_child_depth: env_u32(
                "PARTGRAPH_DETAIL_CHILD_DEPTH",
                defaults.detail_child_depth,
            ),
            list_child_depth: env_u32("PARTGRAPH_LIST_CHILD_DEPTH", defaults.list_child_depth),
            report_child_depth: env_u32(
                "PARTGRAPH_REPORT_CHILD_DEPTH",
                defaults.report_child_depth,
            ),
            report_asset_cap: std::env::var("PARTGRAPH_REPORT_ASSET_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.report_asset_cap),
            query_timeout_ms: std::env::var("PARTGRAPH_QUERY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    /// Defaults with the data directory pointed somewhere specific.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// The per-query deadline as a [`Duration`], when configured.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
