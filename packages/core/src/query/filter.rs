//! Filter Descriptor Types
//!
//! A caller filters assets with a map of field name to [`FieldSelection`].
//! Selections are declarative: a value plus an optional operator, never SQL.
//! Before compilation each entry is parsed into a [`FilterCondition`], a
//! tagged form that makes the supported predicate shapes explicit:
//!
//! - `Compare` - one column against one bound value (`=`, `>=`, `<=`)
//! - `Membership` - one column against a bound set (`IN`)
//! - `PartNameOrNumber` - composite selector matching part name *or* number
//! - `HasComponents` - assets having any of the given children
//!
//! Without an explicit operator the shape is inferred from the value: arrays
//! become membership tests, scalars become equality tests. The range keys
//! `productionDateFrom` / `productionDateTo` fold onto the production date
//! column as lower/upper bounds.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::schema;

/// Errors raised while validating caller input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required request key was absent or empty
    #[error("Request is missing key {0}")]
    MissingKey(&'static str),

    /// A filter key survived sanitization but is not recognized
    #[error("Unknown filter key: {0}")]
    UnknownFilterKey(String),

    /// A selection value does not fit the key it was given for
    #[error("Invalid selection for {key}: {reason}")]
    InvalidSelection { key: String, reason: String },

    /// A production-date bound is not an ISO date
    #[error("Invalid date value '{value}' for {key}")]
    InvalidDate { key: String, value: String },

    /// The requested report kind is not supported
    #[error("Unknown report kind: {0}")]
    UnknownReportKind(String),
}

impl ValidationError {
    /// Create an invalid selection error with context.
    pub fn invalid_selection(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSelection {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Comparison operator a caller may attach to a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionOperator {
    /// Exact equality (default for scalar values)
    Eq,
    /// Set membership (default for array values)
    In,
    /// Lower bound, inclusive
    Gte,
    /// Upper bound, inclusive
    Lte,
}

/// One declarative filter entry: a value and an optional operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    /// Explicit operator; inferred from the value shape when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<SelectionOperator>,
    /// The value(s) to match against
    pub value: Value,
}

impl FieldSelection {
    /// Equality selection on a scalar value.
    pub fn equals(value: impl Into<Value>) -> Self {
        Self {
            operator: None,
            value: value.into(),
        }
    }

    /// Membership selection over a set of values.
    pub fn any_of<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            operator: Some(SelectionOperator::In),
            value: Value::Array(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Selection with an explicit operator.
    pub fn with_operator(operator: SelectionOperator, value: impl Into<Value>) -> Self {
        Self {
            operator: Some(operator),
            value: value.into(),
        }
    }
}

/// A filter object: canonical field name to selection.
///
/// A `BTreeMap` keeps compilation order deterministic, which keeps emitted
/// SQL and binding order deterministic.
pub type AssetFilter = BTreeMap<String, FieldSelection>;

/// Build the filter used to address assets by primary key.
pub fn filter_by_serial_numbers(serial_numbers: &[String]) -> AssetFilter {
    let values: Vec<Value> = serial_numbers
        .iter()
        .map(|s| Value::String(s.clone()))
        .collect();

    let mut filter = AssetFilter::new();
    filter.insert(
        "serialNumberCustomer".to_string(),
        FieldSelection {
            operator: Some(SelectionOperator::In),
            value: Value::Array(values),
        },
    );
    filter
}

/// Comparison shape of a [`FilterCondition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gte,
    Lte,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gte => ">=",
            CompareOp::Lte => "<=",
        }
    }
}

/// A parsed, validated filter entry ready for SQL emission.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    /// `column <op> ?` with one bound value
    Compare {
        key: &'static str,
        column: &'static str,
        op: CompareOp,
        value: Value,
    },
    /// `column IN (?, ...)` with one bound value per element
    Membership {
        key: &'static str,
        column: &'static str,
        values: Vec<Value>,
    },
    /// `(part_name_manufacturer = ? OR part_number_manufacturer = ?)`,
    /// both placeholders bound to the same value
    PartNameOrNumber { value: Value },
    /// Assets whose direct children intersect the given serial numbers
    HasComponents { values: Vec<Value> },
}

impl FilterCondition {
    /// Parse one filter entry into its condition, if it produces one.
    ///
    /// `key` must be a canonical filter key (the sanitizer guarantees this
    /// for cleaned filters). The nested-children key `childComponents` is
    /// not expressible as a row predicate and parses to `None`.
    pub fn parse(key: &str, selection: &FieldSelection) -> Result<Option<Self>, ValidationError> {
        let Some(canonical) = schema::canonical_filter_key(key) else {
            return Err(ValidationError::UnknownFilterKey(key.to_string()));
        };

        match canonical {
            schema::CHILD_COMPONENTS_FIELD => Ok(None),
            schema::PART_NAME_NUMBER_FIELD => {
                let value = scalar_value(canonical, &selection.value)?;
                Ok(Some(FilterCondition::PartNameOrNumber { value }))
            }
            schema::COMPONENTS_FIELD => {
                let values = value_list(canonical, &selection.value)?;
                Ok(Some(FilterCondition::HasComponents { values }))
            }
            schema::PRODUCTION_DATE_FROM_KEY => {
                let value = date_value(canonical, &selection.value)?;
                Ok(Some(FilterCondition::Compare {
                    key: canonical,
                    column: schema::PRODUCTION_DATE_COLUMN,
                    op: CompareOp::Gte,
                    value,
                }))
            }
            schema::PRODUCTION_DATE_TO_KEY => {
                let value = date_value(canonical, &selection.value)?;
                Ok(Some(FilterCondition::Compare {
                    key: canonical,
                    column: schema::PRODUCTION_DATE_COLUMN,
                    op: CompareOp::Lte,
                    value,
                }))
            }
            _ => {
                let field = schema::lookup(canonical)
                    .ok_or_else(|| ValidationError::UnknownFilterKey(key.to_string()))?;
                Self::parse_field(field, selection)
            }
        }
    }

    fn parse_field(
        field: &'static schema::AssetField,
        selection: &FieldSelection,
    ) -> Result<Option<Self>, ValidationError> {
        let condition = match selection.operator {
            Some(SelectionOperator::In) => FilterCondition::Membership {
                key: field.name,
                column: field.column,
                values: value_list(field.name, &selection.value)?,
            },
            Some(SelectionOperator::Eq) => FilterCondition::Compare {
                key: field.name,
                column: field.column,
                op: CompareOp::Eq,
                value: scalar_value(field.name, &selection.value)?,
            },
            Some(SelectionOperator::Gte) => FilterCondition::Compare {
                key: field.name,
                column: field.column,
                op: CompareOp::Gte,
                value: scalar_value(field.name, &selection.value)?,
            },
            Some(SelectionOperator::Lte) => FilterCondition::Compare {
                key: field.name,
                column: field.column,
                op: CompareOp::Lte,
                value: scalar_value(field.name, &selection.value)?,
            },
            None => match &selection.value {
                Value::Array(_) => FilterCondition::Membership {
                    key: field.name,
                    column: field.column,
                    values: value_list(field.name, &selection.value)?,
                },
                _ => FilterCondition::Compare {
                    key: field.name,
                    column: field.column,
                    op: CompareOp::Eq,
                    value: scalar_value(field.name, &selection.value)?,
                },
            },
        };
        Ok(Some(condition))
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn scalar_value(key: &str, value: &Value) -> Result<Value, ValidationError> {
    if is_scalar(value) {
        Ok(value.clone())
    } else {
        Err(ValidationError::invalid_selection(
            key,
            "expected a single string, number or boolean value",
        ))
    }
}

fn value_list(key: &str, value: &Value) -> Result<Vec<Value>, ValidationError> {
    let values = match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Err(ValidationError::invalid_selection(
                    key,
                    "membership set must not be empty",
                ));
            }
            if let Some(bad) = items.iter().find(|v| !is_scalar(v)) {
                return Err(ValidationError::invalid_selection(
                    key,
                    format!("membership set contains non-scalar value: {}", bad),
                ));
            }
            items.clone()
        }
        _ => vec![scalar_value(key, value)?],
    };
    Ok(values)
}

fn date_value(key: &str, value: &Value) -> Result<Value, ValidationError> {
    let invalid = || ValidationError::InvalidDate {
        key: key.to_string(),
        value: value.to_string(),
    };

    let text = value.as_str().ok_or_else(invalid)?;
    if text.len() < 10 {
        return Err(invalid());
    }
    NaiveDate::parse_from_str(&text[..10], "%Y-%m-%d").map_err(|_| invalid())?;
    Ok(value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_infers_equality() {
        let selection = FieldSelection::equals("ACME");
        let condition = FilterCondition::parse("manufacturer", &selection)
            .unwrap()
            .unwrap();

        assert_eq!(
            condition,
            FilterCondition::Compare {
                key: "manufacturer",
                column: "manufacturer",
                op: CompareOp::Eq,
                value: json!("ACME"),
            }
        );
    }

    #[test]
    fn test_array_infers_membership() {
        let selection = FieldSelection {
            operator: None,
            value: json!(["OK", "NOK"]),
        };
        let condition = FilterCondition::parse("qualityStatus", &selection)
            .unwrap()
            .unwrap();

        assert_eq!(
            condition,
            FilterCondition::Membership {
                key: "qualityStatus",
                column: "quality_status",
                values: vec![json!("OK"), json!("NOK")],
            }
        );
    }

    #[test]
    fn test_snake_case_key_parses_to_canonical_condition() {
        let selection = FieldSelection::equals("OK");
        let condition = FilterCondition::parse("quality_status", &selection)
            .unwrap()
            .unwrap();

        match condition {
            FilterCondition::Compare { key, column, .. } => {
                assert_eq!(key, "qualityStatus");
                assert_eq!(column, "quality_status");
            }
            other => panic!("unexpected condition: {other:?}"),
        }
    }

    #[test]
    fn test_part_name_number_requires_scalar() {
        let selection = FieldSelection::equals("gearbox");
        let condition = FilterCondition::parse("partNameNumber", &selection)
            .unwrap()
            .unwrap();
        assert_eq!(
            condition,
            FilterCondition::PartNameOrNumber {
                value: json!("gearbox")
            }
        );

        let bad = FieldSelection {
            operator: None,
            value: json!(["gearbox"]),
        };
        assert!(matches!(
            FilterCondition::parse("partNameNumber", &bad),
            Err(ValidationError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn test_date_bounds_fold_onto_production_date() {
        let from = FieldSelection::equals("2021-06-01");
        let condition = FilterCondition::parse("productionDateFrom", &from)
            .unwrap()
            .unwrap();
        assert_eq!(
            condition,
            FilterCondition::Compare {
                key: "productionDateFrom",
                column: "production_date_gmt",
                op: CompareOp::Gte,
                value: json!("2021-06-01"),
            }
        );

        let to = FieldSelection::equals("2021-06-30T23:59:59");
        let condition = FilterCondition::parse("productionDateTo", &to)
            .unwrap()
            .unwrap();
        assert!(matches!(
            condition,
            FilterCondition::Compare {
                op: CompareOp::Lte,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let bad = FieldSelection::equals("June 1st");
        assert!(matches!(
            FilterCondition::parse("productionDateFrom", &bad),
            Err(ValidationError::InvalidDate { .. })
        ));

        let numeric = FieldSelection::equals(20210601);
        assert!(matches!(
            FilterCondition::parse("productionDateTo", &numeric),
            Err(ValidationError::InvalidDate { .. })
        ));
    }

    #[test]
    fn test_child_components_produces_no_condition() {
        let selection = FieldSelection::equals("anything");
        assert_eq!(FilterCondition::parse("childComponents", &selection), Ok(None));
    }

    #[test]
    fn test_empty_membership_set_is_rejected() {
        let selection = FieldSelection {
            operator: Some(SelectionOperator::In),
            value: json!([]),
        };
        assert!(matches!(
            FilterCondition::parse("manufacturer", &selection),
            Err(ValidationError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let selection = FieldSelection::equals("x");
        assert!(matches!(
            FilterCondition::parse("; DROP TABLE assets;", &selection),
            Err(ValidationError::UnknownFilterKey(_))
        ));
    }

    #[test]
    fn test_selection_serde_shape() {
        let selection: FieldSelection =
            serde_json::from_value(json!({ "operator": "in", "value": ["A", "B"] })).unwrap();
        assert_eq!(selection.operator, Some(SelectionOperator::In));

        let plain: FieldSelection = serde_json::from_value(json!({ "value": "A" })).unwrap();
        assert_eq!(plain.operator, None);
        assert_eq!(plain.value, json!("A"));
    }

    #[test]
    fn test_filter_by_serial_numbers_shape() {
        let filter = filter_by_serial_numbers(&["SN-1".to_string(), "SN-2".to_string()]);
        let selection = filter.get("serialNumberCustomer").unwrap();
        assert_eq!(selection.operator, Some(SelectionOperator::In));
        assert_eq!(selection.value, json!(["SN-1", "SN-2"]));
    }
}
