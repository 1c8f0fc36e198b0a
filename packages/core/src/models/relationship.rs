//! Parent/child relationship edge between two assets.

use serde::{Deserialize, Serialize};

/// One directed edge of the component graph.
///
/// Edges are keyed by the (parent, child) pair. `transfer_status` tracks the
/// exchange state of the edge and is only consumed by relationship analytics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub parent_serial_number_customer: String,
    pub child_serial_number_customer: String,
    pub transfer_status: String,
}

impl Relationship {
    /// Create an edge with the given transfer status.
    pub fn new(
        parent: impl Into<String>,
        child: impl Into<String>,
        transfer_status: impl Into<String>,
    ) -> Self {
        Self {
            parent_serial_number_customer: parent.into(),
            child_serial_number_customer: child.into(),
            transfer_status: transfer_status.into(),
        }
    }
}
