//! Asset Schema Registry
//!
//! The canonical whitelist of asset fields known to the query layer. Every
//! caller-supplied field or filter key is resolved against this table before
//! it can reach a SQL statement; anything it does not know is dropped by the
//! sanitizer (`crate::query::sanitize`).
//!
//! Fields have two spellings: the external camelCase name used in filters,
//! projections and JSON output, and the physical snake_case column name used
//! in SQL. Lookups accept either spelling and return the canonical entry.
//!
//! A small set of *pseudo-fields* is not backed by a physical column but is
//! still addressable in filters and projections:
//!
//! - `componentsSerialNumbers` - aggregate of direct child serial numbers
//! - `childComponents` - recursively nested child nodes
//! - `partNameNumber` - composite selector over part name *or* part number
//!
//! The filter-only range keys `productionDateFrom` / `productionDateTo` both
//! target the `production_date_gmt` column.

/// How a field's values behave in comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain text attribute
    Text,
    /// ISO-8601 date/timestamp attribute
    Date,
}

/// One registered asset field: external name, physical column, value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetField {
    /// External camelCase name (filters, projections, JSON output)
    pub name: &'static str,
    /// Physical snake_case column name (SQL)
    pub column: &'static str,
    /// Value kind
    pub kind: FieldKind,
}

/// Primary key column of the assets table.
pub const SERIAL_NUMBER_COLUMN: &str = "serial_number_customer";

/// Column holding the production timestamp (list ordering, date ranges).
pub const PRODUCTION_DATE_COLUMN: &str = "production_date_gmt";

/// Pseudo-field: aggregate of direct child serial numbers.
pub const COMPONENTS_FIELD: &str = "componentsSerialNumbers";
/// Snake-case spelling of [`COMPONENTS_FIELD`].
pub const COMPONENTS_COLUMN: &str = "components_serial_numbers";

/// Pseudo-field: recursively nested child nodes.
pub const CHILD_COMPONENTS_FIELD: &str = "childComponents";
/// Snake-case spelling of [`CHILD_COMPONENTS_FIELD`].
pub const CHILD_COMPONENTS_COLUMN: &str = "child_components";

/// Pseudo-field: composite "part name or part number" selector.
pub const PART_NAME_NUMBER_FIELD: &str = "partNameNumber";
/// Snake-case spelling of [`PART_NAME_NUMBER_FIELD`].
pub const PART_NAME_NUMBER_COLUMN: &str = "part_name_number";

/// Columns the composite part selector expands to.
pub const PART_NAME_MANUFACTURER_COLUMN: &str = "part_name_manufacturer";
/// See [`PART_NAME_MANUFACTURER_COLUMN`].
pub const PART_NUMBER_MANUFACTURER_COLUMN: &str = "part_number_manufacturer";

/// Filter key: lower bound on `production_date_gmt`.
pub const PRODUCTION_DATE_FROM_KEY: &str = "productionDateFrom";
/// Filter key: upper bound on `production_date_gmt`.
pub const PRODUCTION_DATE_TO_KEY: &str = "productionDateTo";

/// Field carrying the owning organization of an asset row.
pub const MSPID_FIELD: &str = "mspid";

/// Sentinel child serial written by some ingestion paths for "no children".
/// Must never surface in a children aggregate.
pub const NULL_CHILD_SENTINEL: &str = "null";

const ASSET_FIELDS: &[AssetField] = &[
    AssetField {
        name: "serialNumberCustomer",
        column: "serial_number_customer",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "serialNumberManufacturer",
        column: "serial_number_manufacturer",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "partNameManufacturer",
        column: "part_name_manufacturer",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "partNumberManufacturer",
        column: "part_number_manufacturer",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "partNumberCustomer",
        column: "part_number_customer",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "manufacturer",
        column: "manufacturer",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "productionCountryCodeManufacturer",
        column: "production_country_code_manufacturer",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "productionDateGmt",
        column: "production_date_gmt",
        kind: FieldKind::Date,
    },
    AssetField {
        name: "qualityStatus",
        column: "quality_status",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "status",
        column: "status",
        kind: FieldKind::Text,
    },
    AssetField {
        name: "mspid",
        column: "mspid",
        kind: FieldKind::Text,
    },
];

/// All registered asset fields in canonical order.
pub fn fields() -> &'static [AssetField] {
    ASSET_FIELDS
}

/// Resolve a field by external name or physical column name.
pub fn lookup(name: &str) -> Option<&'static AssetField> {
    ASSET_FIELDS
        .iter()
        .find(|f| f.name == name || f.column == name)
}

/// Canonical (camelCase) spelling of a projection field, if known.
///
/// Accepts either spelling of registry fields plus the children-aggregate
/// pseudo-field; everything else resolves to `None`.
pub fn canonical_field(name: &str) -> Option<&'static str> {
    if name == COMPONENTS_FIELD || name == COMPONENTS_COLUMN {
        return Some(COMPONENTS_FIELD);
    }
    lookup(name).map(|f| f.name)
}

/// Canonical (camelCase) spelling of a filter key, if known.
///
/// Filter keys cover the registry fields, the pseudo-fields and the
/// production-date range keys.
pub fn canonical_filter_key(name: &str) -> Option<&'static str> {
    match name {
        COMPONENTS_FIELD | COMPONENTS_COLUMN => Some(COMPONENTS_FIELD),
        CHILD_COMPONENTS_FIELD | CHILD_COMPONENTS_COLUMN => Some(CHILD_COMPONENTS_FIELD),
        PART_NAME_NUMBER_FIELD | PART_NAME_NUMBER_COLUMN => Some(PART_NAME_NUMBER_FIELD),
        PRODUCTION_DATE_FROM_KEY | "production_date_from" => Some(PRODUCTION_DATE_FROM_KEY),
        PRODUCTION_DATE_TO_KEY | "production_date_to" => Some(PRODUCTION_DATE_TO_KEY),
        _ => lookup(name).map(|f| f.name),
    }
}

/// Default projection: every registry field by canonical name.
pub fn default_projection() -> Vec<String> {
    ASSET_FIELDS.iter().map(|f| f.name.to_string()).collect()
}
