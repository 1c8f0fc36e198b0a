//! Filter Compiler
//!
//! Turns a sanitized filter object into a SQL predicate fragment plus an
//! ordered list of bound parameters. The compiler is the only place filter
//! input meets SQL text, and it holds one hard rule: caller-supplied values
//! never appear in the emitted SQL. Every literal becomes a `?` placeholder
//! with a matching entry in the binding list, lowered positionally at
//! execution time.
//!
//! The single exception to the rule is the tenant identifier. It is a
//! trusted, internally resolved value and the analytics layer formats it
//! into `CASE WHEN mspid = '...'` expressions directly; it is never part of
//! the predicate built here.
//!
//! # Architecture
//!
//! Compilation runs in three steps:
//!
//! 1. `sanitize::clean_filter` drops unknown keys
//! 2. each surviving entry parses into a [`FilterCondition`]
//! 3. each condition emits one SQL fragment plus its bindings
//!
//! Fragments are joined with `AND`. The filter map is ordered, so the same
//! filter always compiles to the same SQL and the same binding order.

use crate::models::schema;
use crate::models::schema::AssetField;
use crate::query::filter::{AssetFilter, FilterCondition, ValidationError};
use crate::query::sanitize;

use serde_json::Value as JsonValue;

/// One bound parameter: the filter key it came from and the SQL value.
///
/// The key is diagnostic only; parameters are lowered by position.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Canonical filter key this value belongs to
    pub name: String,
    /// The value as it will be bound
    pub value: libsql::Value,
}

/// The compiled form of a filter: predicate fragments, bindings, projection.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// `AND`-joined predicate fragments, placeholders only
    pub conditions: Vec<String>,
    /// Bound parameters in fragment emission order
    pub bindings: Vec<Binding>,
    /// Columns to project, resolved against the schema registry
    pub projection: Vec<&'static AssetField>,
    /// Whether responses should carry the children aggregate
    pub include_components: bool,
}

impl CompiledQuery {
    /// The full `WHERE` clause, or an empty string for an empty predicate.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Bound parameter values in placeholder order.
    pub fn params(&self) -> Vec<libsql::Value> {
        self.bindings.iter().map(|b| b.value.clone()).collect()
    }
}

/// Compile a filter object against the schema registry.
///
/// `fields` narrows the projection; `None` projects every registry field and
/// includes the children aggregate. `tenant_id` is carried for diagnostics
/// only and never reaches the emitted SQL.
pub fn compile(
    filter: &AssetFilter,
    tenant_id: &str,
    fields: Option<&[String]>,
) -> Result<CompiledQuery, ValidationError> {
    let cleaned = sanitize::clean_filter(filter);

    let mut conditions = Vec::new();
    let mut bindings = Vec::new();
    for (key, selection) in &cleaned {
        let Some(condition) = FilterCondition::parse(key, selection)? else {
            tracing::debug!("[{}] Filter key {} has no row predicate", tenant_id, key);
            continue;
        };
        emit(&condition, &mut conditions, &mut bindings)?;
    }

    let (projection, include_components) = resolve_projection(fields);

    tracing::debug!(
        "[{}] Compiled filter into {} condition(s) with {} binding(s)",
        tenant_id,
        conditions.len(),
        bindings.len()
    );

    Ok(CompiledQuery {
        conditions,
        bindings,
        projection,
        include_components,
    })
}

fn emit(
    condition: &FilterCondition,
    conditions: &mut Vec<String>,
    bindings: &mut Vec<Binding>,
) -> Result<(), ValidationError> {
    match condition {
        FilterCondition::Compare {
            key,
            column,
            op,
            value,
        } => {
            conditions.push(format!("{} {} ?", column, op.sql()));
            bindings.push(Binding {
                name: key.to_string(),
                value: to_sql_value(key, value)?,
            });
        }
        FilterCondition::Membership {
            key,
            column,
            values,
        } => {
            conditions.push(format!("{} IN ({})", column, placeholders(values.len())));
            for value in values {
                bindings.push(Binding {
                    name: key.to_string(),
                    value: to_sql_value(key, value)?,
                });
            }
        }
        FilterCondition::PartNameOrNumber { value } => {
            conditions.push(format!(
                "({} = ? OR {} = ?)",
                schema::PART_NAME_MANUFACTURER_COLUMN,
                schema::PART_NUMBER_MANUFACTURER_COLUMN
            ));
            let bound = to_sql_value(schema::PART_NAME_NUMBER_FIELD, value)?;
            bindings.push(Binding {
                name: schema::PART_NAME_NUMBER_FIELD.to_string(),
                value: bound.clone(),
            });
            bindings.push(Binding {
                name: schema::PART_NAME_NUMBER_FIELD.to_string(),
                value: bound,
            });
        }
        FilterCondition::HasComponents { values } => {
            conditions.push(format!(
                "{} IN (SELECT parent_serial_number_customer FROM relationships \
                 WHERE child_serial_number_customer IN ({}))",
                schema::SERIAL_NUMBER_COLUMN,
                placeholders(values.len())
            ));
            for value in values {
                bindings.push(Binding {
                    name: schema::COMPONENTS_FIELD.to_string(),
                    value: to_sql_value(schema::COMPONENTS_FIELD, value)?,
                });
            }
        }
    }
    Ok(())
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn to_sql_value(key: &str, value: &JsonValue) -> Result<libsql::Value, ValidationError> {
    match value {
        JsonValue::String(s) => Ok(libsql::Value::Text(s.clone())),
        JsonValue::Bool(b) => Ok(libsql::Value::Integer(*b as i64)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(libsql::Value::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(libsql::Value::Real(f))
            } else {
                Err(ValidationError::invalid_selection(
                    key,
                    format!("unsupported numeric value: {}", n),
                ))
            }
        }
        other => Err(ValidationError::invalid_selection(
            key,
            format!("unsupported value: {}", other),
        )),
    }
}

fn resolve_projection(fields: Option<&[String]>) -> (Vec<&'static AssetField>, bool) {
    let Some(raw) = fields else {
        return (schema::fields().iter().collect(), true);
    };

    let cleaned = sanitize::clean_fields(raw);
    let mut projection: Vec<&'static AssetField> = Vec::new();
    let mut include_components = false;
    for name in &cleaned {
        if name == schema::COMPONENTS_FIELD {
            include_components = true;
            continue;
        }
        if let Some(field) = schema::lookup(name) {
            if !projection.iter().any(|f| f.name == field.name) {
                projection.push(field);
            }
        }
    }

    if projection.is_empty() {
        tracing::debug!("Field list resolved to no physical columns, using full projection");
        projection = schema::fields().iter().collect();
    }

    (projection, include_components)
}
