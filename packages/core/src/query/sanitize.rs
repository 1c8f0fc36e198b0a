//! Field and Filter Sanitization
//!
//! Defensive cleanup applied to caller-supplied field lists and filter
//! objects before compilation. Unknown entries are dropped with a log line,
//! never echoed back into SQL. Known entries are rewritten to their canonical
//! camelCase spelling, which makes both functions idempotent: cleaning
//! already-clean input returns it unchanged.

use crate::models::schema;
use crate::query::filter::AssetFilter;

/// Strip unknown names from a projection field list.
///
/// Keeps registry fields and the children-aggregate pseudo-field, canonical
/// spelling, original order. Unknown names are dropped with a debug log.
pub fn clean_fields(fields: &[String]) -> Vec<String> {
    let mut cleaned = Vec::with_capacity(fields.len());
    for field in fields {
        match schema::canonical_field(field) {
            Some(canonical) => cleaned.push(canonical.to_string()),
            None => {
                tracing::debug!("Deleting field {} from field list", field);
            }
        }
    }
    cleaned
}

/// Strip unknown keys from a filter object.
///
/// Keeps registry fields, the pseudo-fields and the production-date range
/// keys, canonical spelling. Unknown keys are dropped with an info log so
/// probing shows up in operational logs.
pub fn clean_filter(filter: &AssetFilter) -> AssetFilter {
    let mut cleaned = AssetFilter::new();
    for (key, selection) in filter {
        match schema::canonical_filter_key(key) {
            Some(canonical) => {
                cleaned.insert(canonical.to_string(), selection.clone());
            }
            None => {
                tracing::info!("Deleting key {} from filter", key);
            }
        }
    }
    cleaned
}
