//! Asset Node Model
//!
//! Data structures returned by the asset query layer. An asset row is a flat
//! bag of whitelisted attributes (see `crate::models::schema`); the query
//! layer augments it with relationship data before it reaches a caller:
//!
//! - `componentsSerialNumbers` - serial numbers of direct children
//! - `childComponents` - recursively materialized child nodes, present only
//!   on tree-shaped responses
//! - `parents` - single-hop parent rows on the parent-resolution path
//!
//! Attributes are kept as a JSON map rather than a fixed struct because the
//! projection is caller-controlled: a response carries exactly the fields
//! that were requested, nothing else. Serialization flattens the map so the
//! wire shape stays `{ "serialNumberCustomer": ..., "manufacturer": ... }`.
//!
//! # Examples
//!
//! ```
//! use partgraph_core::models::AssetNode;
//! use serde_json::json;
//!
//! let node: AssetNode = serde_json::from_value(json!({
//!     "serialNumberCustomer": "SN-001",
//!     "manufacturer": "ACME",
//!     "componentsSerialNumbers": ["SN-002"],
//!     "childComponents": []
//! })).unwrap();
//!
//! assert_eq!(node.serial_number(), Some("SN-001"));
//! assert_eq!(node.components(), &["SN-002".to_string()]);
//! assert!(node.children().is_empty());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single materialized asset node.
///
/// `components_serial_numbers` is `None` when the caller's field selection
/// excluded the aggregate, and `Some` (possibly empty) when it was computed.
/// `child_components` is `None` on flat responses and `Some` on tree-shaped
/// responses; a node sitting exactly at the depth bound carries `Some(vec![])`.
/// Both skip serialization when absent so flat and tree shapes stay distinct
/// on the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetNode {
    /// Projected asset attributes, keyed by canonical camelCase field name
    #[serde(flatten)]
    pub attributes: Map<String, Value>,

    /// Serial numbers of direct children, excluding sentinel entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components_serial_numbers: Option<Vec<String>>,

    /// Recursively materialized children, present on tree responses only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_components: Option<Vec<AssetNode>>,
}

impl AssetNode {
    /// Create a node from projected attributes.
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            attributes,
            components_serial_numbers: None,
            child_components: None,
        }
    }

    /// The node's customer serial number, if it was projected.
    pub fn serial_number(&self) -> Option<&str> {
        self.attributes
            .get("serialNumberCustomer")
            .and_then(Value::as_str)
    }

    /// A projected attribute by canonical field name.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Direct child serial numbers; empty when the aggregate was excluded.
    pub fn components(&self) -> &[String] {
        self.components_serial_numbers
            .as_deref()
            .unwrap_or_default()
    }

    /// Materialized children; empty on flat responses.
    pub fn children(&self) -> &[AssetNode] {
        self.child_components.as_deref().unwrap_or_default()
    }
}

/// An asset merged with its single-hop parents.
///
/// `parents` holds the projected attribute rows of every direct parent across
/// all requested serial numbers. An existing asset without parents carries an
/// empty list rather than a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetWithParents {
    /// Projected attributes of the primary asset
    #[serde(flatten)]
    pub attributes: Map<String, Value>,

    /// Serial numbers of the primary asset's direct children
    pub components_serial_numbers: Vec<String>,

    /// Projected attribute rows of all direct parents
    pub parents: Vec<Map<String, Value>>,
}

/// One page of a list response.
///
/// `result_length` is the size of the full filtered result set, not of this
/// page, and is stable across pages of the same query. `next_page` is true
/// when the request was paginated and further rows exist beyond this page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Materialized nodes for this page
    pub data: Vec<AssetNode>,
    /// Total number of matching root rows
    pub result_length: u64,
    /// Whether another page of results exists
    pub next_page: bool,
}

impl Page {
    /// The canonical empty page: no rows, zero total, no next page.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            result_length: 0,
            next_page: false,
        }
    }
}

/// A full asset row as stored, used by ingestion helpers and test fixtures.
///
/// The read path never constructs these; query responses are projected
/// attribute maps instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub serial_number_customer: String,
    pub serial_number_manufacturer: String,
    pub part_name_manufacturer: String,
    pub part_number_manufacturer: String,
    pub part_number_customer: String,
    pub manufacturer: String,
    pub production_country_code_manufacturer: String,
    pub production_date_gmt: String,
    pub quality_status: String,
    pub status: String,
    pub mspid: String,
}
