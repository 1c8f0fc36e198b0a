//! Asset Analytics Service
//!
//! Aggregate statistics over a tenant's asset store: totals split into own
//! and foreign assets, per-day production counts, quality status per
//! manufacturer, geographic distribution, and relationship transfer states.
//!
//! All aggregates accept the same declarative filter as the asset queries
//! and compile it through the same pipeline, so filter values stay bound
//! parameters here too. The one deliberate exception is the tenant id: the
//! own/other split needs it inside `CASE WHEN mspid = '...'` expressions,
//! and it is a trusted internally resolved value, never caller input.
//!
//! A filter without production-date bounds is widened to the trailing 30
//! days before any aggregate runs.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::TenantRegistry;
use crate::models::schema;
use crate::query::{compile, AssetFilter, FieldSelection, ValidationError};
use crate::services::error::QueryServiceError;

/// Total asset count split into own and foreign rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetCounts {
    pub assets_count: u64,
    pub own_assets_count: u64,
    pub other_assets_count: u64,
}

/// Per-day production counts keyed by ISO date.
///
/// `own_assets` is zero-filled over the queried date window; `other_assets`
/// only carries days that had matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsPerDay {
    pub own_assets: BTreeMap<String, u64>,
    pub other_assets: BTreeMap<String, u64>,
}

/// OK/NOK tallies for one manufacturer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QualityCounts {
    #[serde(rename = "OK")]
    pub ok: u64,
    #[serde(rename = "NOK")]
    pub nok: u64,
}

/// Asset count for one (manufacturer, production country) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufacturerCountryCount {
    pub manufacturer: String,
    pub country_code: String,
    pub assets_count: u64,
}

/// The combined KPI document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiStats {
    #[serde(flatten)]
    pub counts: AssetCounts,
    pub assets_per_day: AssetsPerDay,
    pub quality_status_ratio: BTreeMap<String, QualityCounts>,
    pub assets_per_manufacturer_and_country: Vec<ManufacturerCountryCount>,
}

/// Aggregate statistics over per-tenant asset stores.
#[derive(Debug, Clone)]
pub struct KpiService {
    registry: Arc<TenantRegistry>,
}

impl KpiService {
    /// Create a service over the given tenant registry.
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self { registry }
    }

    /// Collect the full KPI document for one tenant.
    pub async fn kpi_stats(
        &self,
        filter: &AssetFilter,
        tenant_id: &str,
    ) -> Result<KpiStats, QueryServiceError> {
        tracing::info!("[{}] Collecting KPI stats", tenant_id);
        let filter = with_default_date_range(filter);

        let counts = self.asset_counts(&filter, tenant_id).await?;
        let assets_per_day = self.assets_per_day(&filter, tenant_id).await?;
        let quality_status_ratio = self.quality_status_ratio(&filter, tenant_id).await?;
        let assets_per_manufacturer_and_country = self
            .assets_per_manufacturer_and_country(&filter, tenant_id)
            .await?;

        Ok(KpiStats {
            counts,
            assets_per_day,
            quality_status_ratio,
            assets_per_manufacturer_and_country,
        })
    }

    /// Matching asset totals split into own and foreign rows.
    pub async fn asset_counts(
        &self,
        filter: &AssetFilter,
        tenant_id: &str,
    ) -> Result<AssetCounts, QueryServiceError> {
        let compiled = compile(filter, tenant_id, None)?;
        let db = self.registry.connect(tenant_id).await?;

        let sql = format!(
            "SELECT COUNT(*), \
             SUM(CASE WHEN mspid = '{0}' THEN 1 ELSE 0 END), \
             SUM(CASE WHEN mspid != '{0}' THEN 1 ELSE 0 END) \
             FROM assets {1}",
            tenant_id,
            compiled.where_clause()
        );
        let rows = db.query(&sql, compiled.params()).await?;
        let Some(row) = rows.first() else {
            return Ok(AssetCounts::default());
        };

        Ok(AssetCounts {
            assets_count: decode_count(row, 0)?,
            own_assets_count: decode_count(row, 1)?,
            other_assets_count: decode_count(row, 2)?,
        })
    }

    /// Per-day own/other production counts over the filtered date window.
    pub async fn assets_per_day(
        &self,
        filter: &AssetFilter,
        tenant_id: &str,
    ) -> Result<AssetsPerDay, QueryServiceError> {
        let filter = with_default_date_range(filter);
        let (from, to) = date_range_of(&filter)?;
        let compiled = compile(&filter, tenant_id, None)?;
        let db = self.registry.connect(tenant_id).await?;

        let sql = format!(
            "SELECT substr(production_date_gmt, 1, 10) AS day, \
             SUM(CASE WHEN mspid = '{0}' THEN 1 ELSE 0 END), \
             SUM(CASE WHEN mspid != '{0}' THEN 1 ELSE 0 END) \
             FROM assets {1} \
             GROUP BY substr(production_date_gmt, 1, 10) \
             ORDER BY day",
            tenant_id,
            compiled.where_clause()
        );
        let rows = db.query(&sql, compiled.params()).await?;

        let mut per_day = AssetsPerDay {
            own_assets: zero_filled_days(from, to),
            other_assets: BTreeMap::new(),
        };
        for row in &rows {
            let day = row.get::<String>(0).map_err(|e| {
                QueryServiceError::query_failed(format!("Failed to get day bucket: {}", e))
            })?;
            let own = decode_count(row, 1)?;
            let other = decode_count(row, 2)?;
            per_day.own_assets.insert(day.clone(), own);
            per_day.other_assets.insert(day, other);
        }
        Ok(per_day)
    }

    /// OK/NOK tallies per manufacturer.
    ///
    /// Every manufacturer present in the store appears in the result; those
    /// without rows matching the filter carry zero tallies.
    pub async fn quality_status_ratio(
        &self,
        filter: &AssetFilter,
        tenant_id: &str,
    ) -> Result<BTreeMap<String, QualityCounts>, QueryServiceError> {
        let compiled = compile(filter, tenant_id, None)?;
        let db = self.registry.connect(tenant_id).await?;

        let sql = format!(
            "WITH counted AS ( \
                 SELECT manufacturer, \
                        SUM(CASE WHEN quality_status = 'OK' THEN 1 ELSE 0 END) AS ok_count, \
                        SUM(CASE WHEN quality_status = 'NOK' THEN 1 ELSE 0 END) AS nok_count \
                 FROM assets {} \
                 GROUP BY manufacturer \
             ) \
             SELECT manufacturer, ok_count, nok_count FROM counted \
             UNION ALL \
             SELECT manufacturer, 0, 0 \
             FROM (SELECT DISTINCT manufacturer FROM assets) all_manufacturers \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM counted \
                 WHERE counted.manufacturer = all_manufacturers.manufacturer \
             )",
            compiled.where_clause()
        );
        let rows = db.query(&sql, compiled.params()).await?;

        let mut ratio = BTreeMap::new();
        for row in &rows {
            let manufacturer = row.get::<String>(0).map_err(|e| {
                QueryServiceError::query_failed(format!("Failed to get manufacturer: {}", e))
            })?;
            ratio.insert(
                manufacturer,
                QualityCounts {
                    ok: decode_count(row, 1)?,
                    nok: decode_count(row, 2)?,
                },
            );
        }
        Ok(ratio)
    }

    /// Matching asset counts grouped by manufacturer and production country.
    pub async fn assets_per_manufacturer_and_country(
        &self,
        filter: &AssetFilter,
        tenant_id: &str,
    ) -> Result<Vec<ManufacturerCountryCount>, QueryServiceError> {
        let compiled = compile(filter, tenant_id, None)?;
        let db = self.registry.connect(tenant_id).await?;

        let sql = format!(
            "SELECT manufacturer, production_country_code_manufacturer, COUNT(*) \
             FROM assets {} \
             GROUP BY manufacturer, production_country_code_manufacturer \
             ORDER BY manufacturer, production_country_code_manufacturer",
            compiled.where_clause()
        );
        let rows = db.query(&sql, compiled.params()).await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in &rows {
            let manufacturer = row.get::<String>(0).map_err(|e| {
                QueryServiceError::query_failed(format!("Failed to get manufacturer: {}", e))
            })?;
            let country_code = row.get::<String>(1).map_err(|e| {
                QueryServiceError::query_failed(format!("Failed to get country code: {}", e))
            })?;
            counts.push(ManufacturerCountryCount {
                manufacturer,
                country_code,
                assets_count: decode_count(row, 2)?,
            });
        }
        Ok(counts)
    }

    /// Relationship edge counts grouped by transfer status.
    pub async fn relationship_stats(
        &self,
        tenant_id: &str,
    ) -> Result<BTreeMap<String, u64>, QueryServiceError> {
        let db = self.registry.connect(tenant_id).await?;
        let rows = db
            .query(
                "SELECT transfer_status, COUNT(*) FROM relationships \
                 GROUP BY transfer_status ORDER BY transfer_status",
                Vec::new(),
            )
            .await?;

        let mut stats = BTreeMap::new();
        for row in &rows {
            let status = row.get::<String>(0).map_err(|e| {
                QueryServiceError::query_failed(format!("Failed to get transfer status: {}", e))
            })?;
            stats.insert(status, decode_count(row, 1)?);
        }
        Ok(stats)
    }
}

/// Widen a filter to the trailing 30 days when it has no date bounds.
fn with_default_date_range(filter: &AssetFilter) -> AssetFilter {
    let mut filter = filter.clone();
    let today = Utc::now().date_naive();

    filter
        .entry(schema::PRODUCTION_DATE_FROM_KEY.to_string())
        .or_insert_with(|| {
            FieldSelection::equals((today - Duration::days(30)).format("%Y-%m-%d").to_string())
        });
    filter
        .entry(schema::PRODUCTION_DATE_TO_KEY.to_string())
        .or_insert_with(|| FieldSelection::equals(today.format("%Y-%m-%d").to_string()));
    filter
}

/// The date window of a filter that carries both bounds.
fn date_range_of(filter: &AssetFilter) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let from = bound_date(filter, schema::PRODUCTION_DATE_FROM_KEY)?;
    let to = bound_date(filter, schema::PRODUCTION_DATE_TO_KEY)?;
    Ok((from, to))
}

fn bound_date(filter: &AssetFilter, key: &'static str) -> Result<NaiveDate, ValidationError> {
    let text = filter
        .get(key)
        .and_then(|selection| selection.value.as_str())
        .unwrap_or_default();

    if text.len() >= 10 {
        if let Ok(date) = NaiveDate::parse_from_str(&text[..10], "%Y-%m-%d") {
            return Ok(date);
        }
    }
    Err(ValidationError::InvalidDate {
        key: key.to_string(),
        value: text.to_string(),
    })
}

fn zero_filled_days(from: NaiveDate, to: NaiveDate) -> BTreeMap<String, u64> {
    let mut days = BTreeMap::new();
    let mut current = from;
    while current <= to {
        days.insert(current.format("%Y-%m-%d").to_string(), 0);
        current = current + Duration::days(1);
    }
    days
}

fn decode_count(row: &libsql::Row, index: i32) -> Result<u64, QueryServiceError> {
    let value = row.get_value(index).map_err(|e| {
        QueryServiceError::query_failed(format!("Failed to get count column {}: {}", index, e))
    })?;
    match value {
        libsql::Value::Integer(i) => Ok(i.max(0) as u64),
        // SUM over zero rows yields NULL
        libsql::Value::Null => Ok(0),
        libsql::Value::Real(f) => Ok(f.max(0.0) as u64),
        other => Err(QueryServiceError::query_failed(format!(
            "Unexpected count value: {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_filled_days_is_inclusive() {
        let from = NaiveDate::from_ymd_opt(2021, 6, 28).unwrap();
        let to = NaiveDate::from_ymd_opt(2021, 7, 2).unwrap();

        let days = zero_filled_days(from, to);
        assert_eq!(days.len(), 5);
        assert_eq!(days.get("2021-06-28"), Some(&0));
        assert_eq!(days.get("2021-07-02"), Some(&0));
        assert!(days.get("2021-07-03").is_none());
    }

    #[test]
    fn test_zero_filled_days_empty_for_reversed_range() {
        let from = NaiveDate::from_ymd_opt(2021, 7, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2021, 6, 28).unwrap();
        assert!(zero_filled_days(from, to).is_empty());
    }

    #[test]
    fn test_default_date_range_fills_missing_bounds() {
        let filter = with_default_date_range(&AssetFilter::new());
        let (from, to) = date_range_of(&filter).unwrap();
        assert_eq!(to - from, Duration::days(30));
    }

    #[test]
    fn test_default_date_range_keeps_explicit_bounds() {
        let mut filter = AssetFilter::new();
        filter.insert(
            schema::PRODUCTION_DATE_FROM_KEY.to_string(),
            FieldSelection::equals("2021-06-01"),
        );
        filter.insert(
            schema::PRODUCTION_DATE_TO_KEY.to_string(),
            FieldSelection::equals("2021-06-30"),
        );

        let widened = with_default_date_range(&filter);
        let (from, to) = date_range_of(&widened).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2021, 6, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2021, 6, 30).unwrap());
    }

    #[test]
    fn test_quality_counts_serialize_with_uppercase_keys() {
        let counts = QualityCounts { ok: 3, nok: 1 };
        assert_eq!(
            serde_json::to_value(counts).unwrap(),
            json!({ "OK": 3, "NOK": 1 })
        );
    }

    #[test]
    fn test_kpi_stats_flattens_counts() {
        let stats = KpiStats {
            counts: AssetCounts {
                assets_count: 10,
                own_assets_count: 7,
                other_assets_count: 3,
            },
            assets_per_day: AssetsPerDay::default(),
            quality_status_ratio: BTreeMap::new(),
            assets_per_manufacturer_and_country: Vec::new(),
        };

        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["assetsCount"], 10);
        assert_eq!(value["ownAssetsCount"], 7);
        assert_eq!(value["otherAssetsCount"], 3);
        assert!(value.get("counts").is_none());
        assert!(value["assetsPerDay"]["ownAssets"].is_object());
    }
}
