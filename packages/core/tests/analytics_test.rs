//! Integration tests for KpiService and ReportService
//!
//! Tests cover:
//! - Own/other asset counts under a date filter
//! - Zero-filled per-day production buckets
//! - Quality status ratios including zero-count manufacturers
//! - Relationship transfer statistics
//! - Report collection, capacity cap and owner scrubbing

use anyhow::Result;
use std::sync::Arc;

use partgraph_core::config::CoreConfig;
use partgraph_core::db::TenantRegistry;
use partgraph_core::models::{AssetRecord, Relationship};
use partgraph_core::query::{AssetFilter, FieldSelection};
use partgraph_core::services::{
    AssetQueryService, KpiService, QueryServiceError, ReportKind, ReportService,
};
use tempfile::TempDir;

const TENANT: &str = "LISA";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn create_test_env() -> Result<(Arc<TenantRegistry>, TempDir)> {
    init_tracing();
    let temp_dir = TempDir::new()?;
    let config = CoreConfig::with_data_dir(temp_dir.path());
    Ok((Arc::new(TenantRegistry::new(config)), temp_dir))
}

fn asset(serial: &str, date: &str) -> AssetRecord {
    AssetRecord {
        serial_number_customer: serial.to_string(),
        serial_number_manufacturer: format!("M-{}", serial),
        part_name_manufacturer: "Gearbox".to_string(),
        part_number_manufacturer: "GB-100".to_string(),
        part_number_customer: "C-100".to_string(),
        manufacturer: "ACME".to_string(),
        production_country_code_manufacturer: "DE".to_string(),
        production_date_gmt: date.to_string(),
        quality_status: "OK".to_string(),
        status: "PRODUCED".to_string(),
        mspid: TENANT.to_string(),
    }
}

fn june_window() -> AssetFilter {
    let mut filter = AssetFilter::new();
    filter.insert(
        "productionDateFrom".to_string(),
        FieldSelection::equals("2021-06-01"),
    );
    filter.insert(
        "productionDateTo".to_string(),
        FieldSelection::equals("2021-06-05"),
    );
    filter
}

/// Seed three own rows, one foreign row and one row outside the June window.
async fn seed_analytics(registry: &Arc<TenantRegistry>) -> Result<()> {
    let db = registry.connect(TENANT).await?;

    db.insert_asset(&asset("SN-1", "2021-06-01")).await?;
    db.insert_asset(&asset("SN-2", "2021-06-01")).await?;

    let mut nok = asset("SN-3", "2021-06-03");
    nok.quality_status = "NOK".to_string();
    nok.production_country_code_manufacturer = "CN".to_string();
    db.insert_asset(&nok).await?;

    let mut foreign = asset("SN-4", "2021-06-01");
    foreign.mspid = "WERK".to_string();
    foreign.manufacturer = "BOLTWERK".to_string();
    foreign.production_country_code_manufacturer = "PL".to_string();
    db.insert_asset(&foreign).await?;

    let mut outside = asset("SN-5", "2021-07-15");
    outside.manufacturer = "JULYCO".to_string();
    db.insert_asset(&outside).await?;
    Ok(())
}

// =========================================================================
// KPI Tests
// =========================================================================

#[tokio::test]
async fn test_asset_counts_split_own_and_other() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    seed_analytics(&registry).await?;
    let kpi = KpiService::new(registry);

    let counts = kpi.asset_counts(&june_window(), TENANT).await?;
    assert_eq!(counts.assets_count, 4);
    assert_eq!(counts.own_assets_count, 3);
    assert_eq!(counts.other_assets_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_assets_per_day_zero_fills_the_window() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    seed_analytics(&registry).await?;
    let kpi = KpiService::new(registry);

    let per_day = kpi.assets_per_day(&june_window(), TENANT).await?;

    assert_eq!(per_day.own_assets.len(), 5);
    assert_eq!(per_day.own_assets.get("2021-06-01"), Some(&2));
    assert_eq!(per_day.own_assets.get("2021-06-02"), Some(&0));
    assert_eq!(per_day.own_assets.get("2021-06-03"), Some(&1));
    assert_eq!(per_day.own_assets.get("2021-06-05"), Some(&0));

    // Foreign counts only carry days that had matching rows
    assert_eq!(per_day.other_assets.len(), 2);
    assert_eq!(per_day.other_assets.get("2021-06-01"), Some(&1));
    assert_eq!(per_day.other_assets.get("2021-06-03"), Some(&0));
    Ok(())
}

#[tokio::test]
async fn test_quality_ratio_includes_zero_count_manufacturers() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    seed_analytics(&registry).await?;
    let kpi = KpiService::new(registry);

    let ratio = kpi.quality_status_ratio(&june_window(), TENANT).await?;

    let acme = ratio.get("ACME").expect("ACME must be present");
    assert_eq!(acme.ok, 2);
    assert_eq!(acme.nok, 1);

    let boltwerk = ratio.get("BOLTWERK").expect("BOLTWERK must be present");
    assert_eq!(boltwerk.ok, 1);
    assert_eq!(boltwerk.nok, 0);

    // JULYCO has no rows inside the window but still appears
    let julyco = ratio.get("JULYCO").expect("JULYCO must be present");
    assert_eq!(julyco.ok, 0);
    assert_eq!(julyco.nok, 0);
    Ok(())
}

#[tokio::test]
async fn test_assets_per_manufacturer_and_country() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    seed_analytics(&registry).await?;
    let kpi = KpiService::new(registry);

    let counts = kpi
        .assets_per_manufacturer_and_country(&june_window(), TENANT)
        .await?;

    let summary: Vec<(&str, &str, u64)> = counts
        .iter()
        .map(|c| (c.manufacturer.as_str(), c.country_code.as_str(), c.assets_count))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("ACME", "CN", 1),
            ("ACME", "DE", 2),
            ("BOLTWERK", "PL", 1),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_relationship_stats_group_by_transfer_status() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    let db = registry.connect(TENANT).await?;

    db.insert_relationship(&Relationship::new("SN-1", "SN-2", "PENDING"))
        .await?;
    db.insert_relationship(&Relationship::new("SN-1", "SN-3", "PENDING"))
        .await?;
    db.insert_relationship(&Relationship::new("SN-2", "SN-4", "TRANSFERRED"))
        .await?;

    let kpi = KpiService::new(registry);
    let stats = kpi.relationship_stats(TENANT).await?;
    assert_eq!(stats.get("PENDING"), Some(&2));
    assert_eq!(stats.get("TRANSFERRED"), Some(&1));
    assert_eq!(stats.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_kpi_stats_combine_all_aggregates() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    seed_analytics(&registry).await?;
    let kpi = KpiService::new(registry);

    let stats = kpi.kpi_stats(&june_window(), TENANT).await?;
    assert_eq!(stats.counts.assets_count, 4);
    assert_eq!(stats.assets_per_day.own_assets.len(), 5);
    assert_eq!(stats.quality_status_ratio.len(), 3);
    assert_eq!(stats.assets_per_manufacturer_and_country.len(), 3);

    let serialized = serde_json::to_value(&stats)?;
    assert_eq!(serialized["assetsCount"], 4);
    assert!(serialized["qualityStatusRatio"]["ACME"]["OK"].is_number());
    Ok(())
}

#[tokio::test]
async fn test_kpi_default_window_covers_recent_assets() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    let db = registry.connect(TENANT).await?;

    let today = chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string();
    db.insert_asset(&asset("SN-NOW", &today)).await?;
    db.insert_asset(&asset("SN-OLD", "2021-06-01")).await?;

    let kpi = KpiService::new(registry);
    let stats = kpi.kpi_stats(&AssetFilter::new(), TENANT).await?;
    assert_eq!(stats.counts.assets_count, 1);
    assert_eq!(stats.assets_per_day.own_assets.get(&today), Some(&1));
    assert_eq!(stats.assets_per_day.own_assets.len(), 31);
    Ok(())
}

// =========================================================================
// Report Tests
// =========================================================================

/// Seed SN-P -> SN-C1 -> SN-G plus the standalone SN-S.
async fn seed_report_tree(registry: &Arc<TenantRegistry>) -> Result<()> {
    let db = registry.connect(TENANT).await?;

    db.insert_asset(&asset("SN-P", "2021-06-04")).await?;
    db.insert_asset(&asset("SN-C1", "2021-06-03")).await?;
    db.insert_asset(&asset("SN-G", "2021-06-02")).await?;
    db.insert_asset(&asset("SN-S", "2021-06-01")).await?;

    db.insert_relationship(&Relationship::new("SN-P", "SN-C1", "PENDING"))
        .await?;
    db.insert_relationship(&Relationship::new("SN-C1", "SN-G", "PENDING"))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_report_collects_trees_and_scrubs_owner() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    seed_report_tree(&registry).await?;
    let reports = ReportService::new(AssetQueryService::new(registry));

    let report = reports
        .collect_report_data(&AssetFilter::new(), TENANT, ReportKind::ListData)
        .await?;

    assert_eq!(report.kind, ReportKind::ListData);
    assert_eq!(report.result_length, 4);
    assert_eq!(report.data.len(), 4);
    // Only SN-P has a child that carries components of its own
    assert_eq!(report.assets_with_subcomponents, 1);
    assert!(report
        .data
        .iter()
        .all(|row| row.attribute("mspid").is_none()));

    let today = chrono::Utc::now().format("%Y%m%d").to_string();
    assert_eq!(report.file_stem, format!("{}_PartGraphReport", today));
    Ok(())
}

#[tokio::test]
async fn test_customs_report_uses_its_own_stem() -> Result<()> {
    let (registry, _temp_dir) = create_test_env().await?;
    seed_report_tree(&registry).await?;
    let reports = ReportService::new(AssetQueryService::new(registry));

    let report = reports
        .collect_report_data(&AssetFilter::new(), TENANT, ReportKind::Customs)
        .await?;
    assert!(report.file_stem.ends_with("_PartGraphCustomsReport"));
    Ok(())
}

#[tokio::test]
async fn test_report_over_the_cap_is_a_client_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = CoreConfig {
        report_asset_cap: 2,
        ..CoreConfig::with_data_dir(temp_dir.path())
    };
    let registry = Arc::new(TenantRegistry::new(config));
    let db = registry.connect(TENANT).await?;
    for day in 1..=3 {
        db.insert_asset(&asset(&format!("SN-{}", day), &format!("2021-06-0{}", day)))
            .await?;
    }

    let reports = ReportService::new(AssetQueryService::new(registry));
    let err = reports
        .collect_report_data(&AssetFilter::new(), TENANT, ReportKind::ListData)
        .await
        .unwrap_err();

    assert!(matches!(err, QueryServiceError::CapacityExceeded { .. }));
    assert_eq!(err.status_code(), 400);
    Ok(())
}
