//! Asset Query Service
//!
//! The read API over per-tenant asset stores. Callers address assets by
//! customer serial number or by a declarative filter; responses are flat
//! rows, bounded component trees, or an asset merged with its direct
//! parents. All SQL built here runs with bound parameters produced by the
//! filter compiler.
//!
//! # Architecture
//!
//! Tree materialization is a bounded breadth-first walk instead of a
//! recursive SQL query:
//!
//! 1. One root query fetches the filtered, ordered page of root rows (with
//!    a window count when paginated, so the total stays stable across pages)
//! 2. Each round fetches the next level's edges, attribute rows and child
//!    aggregates in batched `IN` queries
//! 3. `tree::assemble_tree` reconstructs nested nodes bottom-up
//!
//! The walk stops at the requested depth; nodes sitting exactly at the
//! bound keep their children aggregate but carry an empty child list.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::{CoreConfig, MAX_TREE_DEPTH};
use crate::db::{value_to_json, TenantDatabase, TenantRegistry};
use crate::models::schema::{self, AssetField};
use crate::models::{AssetNode, AssetWithParents, Page};
use crate::query::{compile, filter_by_serial_numbers, AssetFilter, CompiledQuery, ValidationError};
use crate::services::error::QueryServiceError;
use crate::services::tree::{assemble_tree, TreeRow};

/// IN-list chunk size; SQLite's default bound-parameter limit is 999.
const IN_CHUNK_SIZE: usize = 500;

/// Read API over per-tenant asset stores.
#[derive(Debug, Clone)]
pub struct AssetQueryService {
    registry: Arc<TenantRegistry>,
}

/// One decoded root row: the key plus its projected attributes.
struct RootRow {
    serial: String,
    attributes: Map<String, Value>,
}

impl AssetQueryService {
    /// Create a service over the given tenant registry.
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self { registry }
    }

    /// The configuration behind this service.
    pub fn config(&self) -> &CoreConfig {
        self.registry.config()
    }

    /// The tenant registry behind this service.
    pub fn registry(&self) -> &Arc<TenantRegistry> {
        &self.registry
    }

    /// Ensure a tenant's store exists and is ready for queries.
    pub async fn initialize_tenant(&self, tenant_id: &str) -> Result<(), QueryServiceError> {
        tracing::info!("[{}] Initializing tenant store", tenant_id);
        self.registry.initialize_tenant(tenant_id).await?;
        Ok(())
    }

    /// Distinct tenant identifiers present in a tenant's asset rows.
    pub async fn list_tenant_identifiers(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<String>, QueryServiceError> {
        let db = self.registry.connect(tenant_id).await?;
        let rows = db
            .query("SELECT DISTINCT mspid FROM assets ORDER BY mspid", Vec::new())
            .await?;

        let mut tenants = Vec::with_capacity(rows.len());
        for row in &rows {
            let mspid = row.get::<String>(0).map_err(|e| {
                QueryServiceError::query_failed(format!("Failed to get mspid: {}", e))
            })?;
            tenants.push(mspid);
        }
        Ok(tenants)
    }

    /// Fetch one asset, materialized to `max_depth` child levels.
    ///
    /// Several serial numbers may be passed; the first match in production
    /// date order wins. Returns `None` when nothing matches. Depth 0 yields
    /// the flat shape without a `childComponents` key.
    pub async fn get_node(
        &self,
        serial_numbers: &[String],
        max_depth: u32,
        tenant_id: &str,
    ) -> Result<Option<AssetNode>, QueryServiceError> {
        if serial_numbers.is_empty() {
            return Err(ValidationError::MissingKey("serialNumberCustomer").into());
        }
        tracing::info!(
            "[{}] get_node for {} serial number(s) at depth {}",
            tenant_id,
            serial_numbers.len(),
            max_depth
        );

        let filter = filter_by_serial_numbers(serial_numbers);
        let compiled = compile(&filter, tenant_id, None)?;
        let db = self.registry.connect(tenant_id).await?;

        let page = self.materialize(&db, &compiled, max_depth, 0).await?;
        Ok(page.data.into_iter().next())
    }

    /// List assets matching a filter, materialized to `max_depth` levels.
    ///
    /// `page` of 0 disables pagination and returns the full result set;
    /// pages start at 1 and use the configured page size. Roots are ordered
    /// by production date, newest first.
    pub async fn list_nodes(
        &self,
        filter: &AssetFilter,
        fields: Option<&[String]>,
        max_depth: u32,
        tenant_id: &str,
        page: u32,
    ) -> Result<Page, QueryServiceError> {
        tracing::info!(
            "[{}] list_nodes at depth {} page {}",
            tenant_id,
            max_depth,
            page
        );

        let compiled = compile(filter, tenant_id, fields)?;
        let db = self.registry.connect(tenant_id).await?;
        self.materialize(&db, &compiled, max_depth, page).await
    }

    /// Fetch one asset merged with its single-hop parents.
    ///
    /// With several serial numbers the first match provides the base
    /// attributes and children aggregate, while `parents` unions the direct
    /// parents of every requested serial. Returns `None` when no asset
    /// matches; an existing asset without parents gets an empty list.
    pub async fn get_node_with_parents(
        &self,
        serial_numbers: &[String],
        tenant_id: &str,
        fields: Option<&[String]>,
    ) -> Result<Option<AssetWithParents>, QueryServiceError> {
        if serial_numbers.is_empty() {
            return Err(ValidationError::MissingKey("serialNumberCustomer").into());
        }
        tracing::info!(
            "[{}] get_node_with_parents for {} serial number(s)",
            tenant_id,
            serial_numbers.len()
        );

        let filter = filter_by_serial_numbers(serial_numbers);
        let compiled = compile(&filter, tenant_id, fields)?;
        let db = self.registry.connect(tenant_id).await?;

        let (roots, _) = self.fetch_roots(&db, &compiled, 0).await?;
        let Some(base) = roots.into_iter().next() else {
            return Ok(None);
        };

        let base_serial = base.serial.clone();
        let components = self
            .children_map(&db, std::slice::from_ref(&base_serial))
            .await?
            .remove(&base_serial)
            .unwrap_or_default();

        let edges = self.parent_edges(&db, serial_numbers).await?;
        let mut unique_parents: Vec<String> = Vec::new();
        {
            let mut seen = HashSet::new();
            for (_, parent) in &edges {
                if seen.insert(parent.as_str()) {
                    unique_parents.push(parent.clone());
                }
            }
        }
        let parent_rows = self
            .fetch_attributes(&db, &unique_parents, &compiled.projection)
            .await?;

        let mut parents = Vec::with_capacity(edges.len());
        for (_, parent) in &edges {
            // Edges pointing at assets that do not exist resolve to nothing
            if let Some(attributes) = parent_rows.get(parent) {
                parents.push(attributes.clone());
            }
        }

        Ok(Some(AssetWithParents {
            attributes: base.attributes,
            components_serial_numbers: components,
            parents,
        }))
    }

    /// Fetch the direct children of the given assets, one node per edge.
    ///
    /// A child used by two of the requested parents appears twice. The
    /// children aggregate on each node follows the field selection: absent
    /// field list includes it, an explicit list includes it only when it
    /// names `componentsSerialNumbers`.
    pub async fn get_immediate_children(
        &self,
        serial_numbers: &[String],
        tenant_id: &str,
        fields: Option<&[String]>,
    ) -> Result<Vec<AssetNode>, QueryServiceError> {
        if serial_numbers.is_empty() {
            return Err(ValidationError::MissingKey("serialNumberCustomer").into());
        }
        tracing::info!(
            "[{}] get_immediate_children for {} serial number(s)",
            tenant_id,
            serial_numbers.len()
        );

        let compiled = compile(&AssetFilter::new(), tenant_id, fields)?;
        let db = self.registry.connect(tenant_id).await?;

        let child_edges = self.children_map(&db, serial_numbers).await?;
        let mut ordered_children: Vec<String> = Vec::new();
        for parent in serial_numbers {
            if let Some(children) = child_edges.get(parent) {
                ordered_children.extend(children.iter().cloned());
            }
        }
        if ordered_children.is_empty() {
            return Ok(Vec::new());
        }

        let mut unique: Vec<String> = Vec::new();
        {
            let mut seen = HashSet::new();
            for child in &ordered_children {
                if seen.insert(child.as_str()) {
                    unique.push(child.clone());
                }
            }
        }

        let attributes = self
            .fetch_attributes(&db, &unique, &compiled.projection)
            .await?;
        let components = if compiled.include_components {
            self.children_map(&db, &unique).await?
        } else {
            HashMap::new()
        };

        let mut nodes = Vec::with_capacity(ordered_children.len());
        for child in &ordered_children {
            let Some(attrs) = attributes.get(child) else {
                continue;
            };
            nodes.push(AssetNode {
                attributes: attrs.clone(),
                components_serial_numbers: compiled
                    .include_components
                    .then(|| components.get(child).cloned().unwrap_or_default()),
                child_components: None,
            });
        }
        Ok(nodes)
    }

    /// Run a compiled query and materialize its result page.
    async fn materialize(
        &self,
        db: &TenantDatabase,
        compiled: &CompiledQuery,
        max_depth: u32,
        page: u32,
    ) -> Result<Page, QueryServiceError> {
        let depth = if max_depth > MAX_TREE_DEPTH {
            tracing::warn!(
                "Requested tree depth {} exceeds the maximum of {}, clamping",
                max_depth,
                MAX_TREE_DEPTH
            );
            MAX_TREE_DEPTH
        } else {
            max_depth
        };

        let (roots, result_length) = self.fetch_roots(db, compiled, page).await?;
        if roots.is_empty() {
            return Ok(Page::empty());
        }
        let next_page = has_next_page(page, self.config().pagination_limit, result_length);

        // The children aggregate doubles as the edge set the walk expands,
        // so it is fetched whenever the tree goes below the roots.
        let root_serials: Vec<String> = roots.iter().map(|r| r.serial.clone()).collect();
        let root_components = if depth == 0 && !compiled.include_components {
            HashMap::new()
        } else {
            self.children_map(db, &root_serials).await?
        };

        let mut level0 = Vec::with_capacity(roots.len());
        for root in roots {
            let components = root_components
                .get(&root.serial)
                .cloned()
                .unwrap_or_default();
            level0.push(TreeRow {
                serial: root.serial,
                parent: None,
                attributes: root.attributes,
                components,
            });
        }

        if depth == 0 {
            let include = compiled.include_components;
            let data = level0
                .into_iter()
                .map(|row| AssetNode {
                    attributes: row.attributes,
                    components_serial_numbers: include.then(|| row.components),
                    child_components: None,
                })
                .collect();
            return Ok(Page {
                data,
                result_length,
                next_page,
            });
        }

        let mut levels = vec![level0];
        for _ in 0..depth {
            let frontier = &levels[levels.len() - 1];
            let mut edges: Vec<(String, String)> = Vec::new();
            for row in frontier {
                for child in &row.components {
                    edges.push((row.serial.clone(), child.clone()));
                }
            }
            if edges.is_empty() {
                break;
            }

            let mut unique: Vec<String> = Vec::new();
            {
                let mut seen = HashSet::new();
                for (_, child) in &edges {
                    if seen.insert(child.as_str()) {
                        unique.push(child.clone());
                    }
                }
            }

            let attributes = self
                .fetch_attributes(db, &unique, &compiled.projection)
                .await?;
            let components = self.children_map(db, &unique).await?;

            let mut next_level = Vec::with_capacity(edges.len());
            for (parent, child) in edges {
                // Edges pointing at assets that do not exist are skipped
                let Some(attrs) = attributes.get(&child) else {
                    continue;
                };
                next_level.push(TreeRow {
                    serial: child.clone(),
                    parent: Some(parent),
                    attributes: attrs.clone(),
                    components: components.get(&child).cloned().unwrap_or_default(),
                });
            }
            if next_level.is_empty() {
                break;
            }
            levels.push(next_level);
        }

        let mut data = assemble_tree(&levels);
        if !compiled.include_components {
            strip_components(&mut data);
        }
        Ok(Page {
            data,
            result_length,
            next_page,
        })
    }

    /// Fetch the filtered, ordered root rows plus the stable total.
    async fn fetch_roots(
        &self,
        db: &TenantDatabase,
        compiled: &CompiledQuery,
        page: u32,
    ) -> Result<(Vec<RootRow>, u64), QueryServiceError> {
        let (columns, plan, total_index) = build_select(&compiled.projection);
        let where_clause = compiled.where_clause();
        let mut params = compiled.params();

        let sql = if page > 0 {
            let limit = self.config().pagination_limit;
            params.push(libsql::Value::Integer(limit as i64));
            params.push(libsql::Value::Integer((page as i64 - 1) * limit as i64));
            format!(
                "SELECT {}, COUNT(*) OVER () AS result_length FROM assets {} \
                 ORDER BY production_date_gmt DESC LIMIT ? OFFSET ?",
                columns, where_clause
            )
        } else {
            format!(
                "SELECT {} FROM assets {} ORDER BY production_date_gmt DESC",
                columns, where_clause
            )
        };

        let rows = db.query(&sql, params).await?;

        let mut result_length = rows.len() as u64;
        if page > 0 {
            if let Some(first) = rows.first() {
                let total = first.get::<i64>(total_index).map_err(|e| {
                    QueryServiceError::query_failed(format!("Failed to get result length: {}", e))
                })?;
                result_length = total.max(0) as u64;
            }
        }

        let mut roots = Vec::with_capacity(rows.len());
        for row in &rows {
            let serial = row.get::<String>(0).map_err(|e| {
                QueryServiceError::query_failed(format!("Failed to get serial number: {}", e))
            })?;
            let attributes = decode_attributes(row, &plan)?;
            roots.push(RootRow { serial, attributes });
        }

        Ok((roots, result_length))
    }

    /// Direct children of the given assets, keyed by parent serial.
    ///
    /// Sentinel children are excluded; edge order follows insertion order.
    async fn children_map(
        &self,
        db: &TenantDatabase,
        serials: &[String],
    ) -> Result<HashMap<String, Vec<String>>, QueryServiceError> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for chunk in serials.chunks(IN_CHUNK_SIZE) {
            let sql = format!(
                "SELECT parent_serial_number_customer, child_serial_number_customer \
                 FROM relationships \
                 WHERE parent_serial_number_customer IN ({}) \
                 AND child_serial_number_customer != ? \
                 ORDER BY rowid",
                placeholders(chunk.len())
            );
            let mut params: Vec<libsql::Value> = chunk
                .iter()
                .map(|s| libsql::Value::Text(s.clone()))
                .collect();
            params.push(libsql::Value::Text(schema::NULL_CHILD_SENTINEL.to_string()));

            let rows = db.query(&sql, params).await?;
            for row in &rows {
                let parent = row.get::<String>(0).map_err(|e| {
                    QueryServiceError::query_failed(format!("Failed to get parent serial: {}", e))
                })?;
                let child = row.get::<String>(1).map_err(|e| {
                    QueryServiceError::query_failed(format!("Failed to get child serial: {}", e))
                })?;
                map.entry(parent).or_default().push(child);
            }
        }
        Ok(map)
    }

    /// Parent edges of the given assets as `(child, parent)` pairs.
    async fn parent_edges(
        &self,
        db: &TenantDatabase,
        serials: &[String],
    ) -> Result<Vec<(String, String)>, QueryServiceError> {
        let mut edges = Vec::new();
        for chunk in serials.chunks(IN_CHUNK_SIZE) {
            let sql = format!(
                "SELECT child_serial_number_customer, parent_serial_number_customer \
                 FROM relationships \
                 WHERE child_serial_number_customer IN ({}) \
                 ORDER BY rowid",
                placeholders(chunk.len())
            );
            let params = chunk
                .iter()
                .map(|s| libsql::Value::Text(s.clone()))
                .collect();

            let rows = db.query(&sql, params).await?;
            for row in &rows {
                let child = row.get::<String>(0).map_err(|e| {
                    QueryServiceError::query_failed(format!("Failed to get child serial: {}", e))
                })?;
                let parent = row.get::<String>(1).map_err(|e| {
                    QueryServiceError::query_failed(format!("Failed to get parent serial: {}", e))
                })?;
                edges.push((child, parent));
            }
        }
        Ok(edges)
    }

    /// Projected attribute rows for the given serials, keyed by serial.
    async fn fetch_attributes(
        &self,
        db: &TenantDatabase,
        serials: &[String],
        projection: &[&'static AssetField],
    ) -> Result<HashMap<String, Map<String, Value>>, QueryServiceError> {
        let (columns, plan, _) = build_select(projection);
        let mut map = HashMap::new();
        for chunk in serials.chunks(IN_CHUNK_SIZE) {
            let sql = format!(
                "SELECT {} FROM assets WHERE {} IN ({})",
                columns,
                schema::SERIAL_NUMBER_COLUMN,
                placeholders(chunk.len())
            );
            let params = chunk
                .iter()
                .map(|s| libsql::Value::Text(s.clone()))
                .collect();

            let rows = db.query(&sql, params).await?;
            for row in &rows {
                let serial = row.get::<String>(0).map_err(|e| {
                    QueryServiceError::query_failed(format!("Failed to get serial number: {}", e))
                })?;
                let attributes = decode_attributes(row, &plan)?;
                map.insert(serial, attributes);
            }
        }
        Ok(map)
    }
}

/// Build the SELECT column list and the decode plan for a projection.
///
/// The key column always leads so batch decoding can rely on position 0;
/// the returned index is where a trailing window column would land.
fn build_select(
    projection: &[&'static AssetField],
) -> (String, Vec<(i32, &'static AssetField)>, i32) {
    let mut columns: Vec<&'static str> = vec![schema::SERIAL_NUMBER_COLUMN];
    let mut plan: Vec<(i32, &'static AssetField)> = Vec::new();
    for &field in projection {
        if field.column == schema::SERIAL_NUMBER_COLUMN {
            plan.push((0, field));
            continue;
        }
        plan.push((columns.len() as i32, field));
        columns.push(field.column);
    }
    let total_index = columns.len() as i32;
    (columns.join(", "), plan, total_index)
}

/// Decode a row into the projected attribute map.
fn decode_attributes(
    row: &libsql::Row,
    plan: &[(i32, &'static AssetField)],
) -> Result<Map<String, Value>, QueryServiceError> {
    let mut attributes = Map::new();
    for (index, field) in plan {
        let value = row.get_value(*index).map_err(|e| {
            QueryServiceError::query_failed(format!(
                "Failed to get column {}: {}",
                field.column, e
            ))
        })?;
        attributes.insert(field.name.to_string(), value_to_json(value));
    }
    Ok(attributes)
}

/// Remove the children aggregate from every node of a materialized tree.
///
/// Used when the caller's field selection excluded the aggregate but the
/// walk still needed the edges to expand the tree.
fn strip_components(nodes: &mut [AssetNode]) {
    for node in nodes {
        node.components_serial_numbers = None;
        if let Some(children) = node.child_components.as_mut() {
            strip_components(children);
        }
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn has_next_page(page: u32, page_size: u32, result_length: u64) -> bool {
    page > 0 && (page as u64) * (page_size as u64) < result_length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_next_page_requires_pagination() {
        assert!(!has_next_page(0, 25, 1000));
        assert!(has_next_page(1, 25, 26));
        assert!(!has_next_page(1, 25, 25));
        assert!(has_next_page(2, 25, 51));
        assert!(!has_next_page(3, 25, 75));
    }

    #[test]
    fn test_build_select_leads_with_key() {
        let projection: Vec<&'static AssetField> = schema::fields().iter().collect();
        let (columns, plan, total_index) = build_select(&projection);

        assert!(columns.starts_with(schema::SERIAL_NUMBER_COLUMN));
        assert_eq!(plan.len(), projection.len());
        // Key column is decoded from position 0 even though it is also projected
        assert_eq!(plan[0].0, 0);
        assert_eq!(total_index as usize, projection.len());
    }

    #[test]
    fn test_build_select_without_key_in_projection() {
        let manufacturer = schema::lookup("manufacturer").unwrap();
        let (columns, plan, total_index) = build_select(&[manufacturer]);

        assert_eq!(columns, "serial_number_customer, manufacturer");
        assert_eq!(plan, vec![(1, manufacturer)]);
        assert_eq!(total_index, 2);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_strip_components_recurses_into_children() {
        let mut child = AssetNode::new(Map::new());
        child.components_serial_numbers = Some(vec!["SN-3".to_string()]);
        child.child_components = Some(vec![]);

        let mut root = AssetNode::new(Map::new());
        root.components_serial_numbers = Some(vec!["SN-2".to_string()]);
        root.child_components = Some(vec![child]);

        let mut nodes = vec![root];
        strip_components(&mut nodes);

        assert!(nodes[0].components_serial_numbers.is_none());
        let children = nodes[0].child_components.as_ref().unwrap();
        assert!(children[0].components_serial_numbers.is_none());
        assert_eq!(children[0].child_components, Some(vec![]));
    }
}
