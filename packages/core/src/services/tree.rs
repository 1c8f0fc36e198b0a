//! Tree Assembly
//!
//! Pure bottom-up reconstruction of component trees from per-level rows.
//! The asset service discovers rows breadth-first (roots at level 0, then
//! one level of children per round, bounded by the requested depth) and
//! hands the levels here; assembly never touches storage, which keeps the
//! depth and containment behavior testable without a database.
//!
//! Each row is one *instance* of an asset under one parent: a part used by
//! two parents yields two rows and ends up materialized under both. Rows at
//! the deepest level become leaves with an empty child list, which is how a
//! response distinguishes "children not expanded" (flat shape, key absent)
//! from "no children within the depth bound" (empty list).

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::models::AssetNode;

/// One discovered asset instance at a specific level of the walk.
#[derive(Debug, Clone)]
pub(crate) struct TreeRow {
    /// Serial number of this asset
    pub serial: String,
    /// Serial number of the parent instance; `None` for roots
    pub parent: Option<String>,
    /// Projected attributes
    pub attributes: Map<String, Value>,
    /// Direct child serial numbers, sentinel-free
    pub components: Vec<String>,
}

/// Assemble materialized root nodes from per-level rows.
///
/// `levels[0]` holds the roots in result order; each deeper vec holds the
/// instances discovered from the level above it. Rows whose parent is not
/// present in the level above are discarded, so nothing outside the walked
/// set can leak into the output.
pub(crate) fn assemble_tree(levels: &[Vec<TreeRow>]) -> Vec<AssetNode> {
    if levels.is_empty() {
        return Vec::new();
    }

    // Children assembled from the level below the one being processed,
    // keyed by parent serial.
    let mut child_nodes: HashMap<String, Vec<AssetNode>> = HashMap::new();

    for depth in (1..levels.len()).rev() {
        let parent_serials: HashSet<&str> = levels[depth - 1]
            .iter()
            .map(|row| row.serial.as_str())
            .collect();

        let mut grouped: HashMap<String, Vec<AssetNode>> = HashMap::new();
        for row in &levels[depth] {
            let Some(parent) = row.parent.as_deref() else {
                continue;
            };
            if !parent_serials.contains(parent) {
                tracing::debug!(
                    "Discarding row {} with parent {} outside the working set",
                    row.serial,
                    parent
                );
                continue;
            }
            grouped
                .entry(parent.to_string())
                .or_default()
                .push(materialize(row, &child_nodes));
        }
        child_nodes = grouped;
    }

    levels[0]
        .iter()
        .map(|row| materialize(row, &child_nodes))
        .collect()
}

fn materialize(row: &TreeRow, child_nodes: &HashMap<String, Vec<AssetNode>>) -> AssetNode {
    AssetNode {
        attributes: row.attributes.clone(),
        components_serial_numbers: Some(row.components.clone()),
        child_components: Some(child_nodes.get(&row.serial).cloned().unwrap_or_default()),
    }
}
