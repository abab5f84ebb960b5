//! SQL construction.
//!
//! Identifiers enter SQL text only after allow-list validation against the
//! introspected catalog, and are double-quote-escaped regardless. Values are
//! never interpolated — every literal travels as a positional parameter.
//! Placeholders carry explicit casts where the wire type the driver sends
//! (int8, float8, text) differs from the column's declared type.

use crate::error::ValidationError;
use crate::query::catalog::{ColumnInfo, ColumnType, TableCatalog};
use crate::query::descriptor::{Filter, FilterOp, QueryDescriptor};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use harbordb_commons::config::QuerySettings;
use serde_json::Value as JsonValue;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

/// A typed value ready to bind.
#[derive(Debug, Clone)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Uuid(Uuid),
    TimestampTz(DateTime<Utc>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Json(JsonValue),
}

impl SqlParam {
    pub fn as_dyn(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlParam::Int(v) => v,
            SqlParam::Float(v) => v,
            SqlParam::Bool(v) => v,
            SqlParam::Text(v) => v,
            SqlParam::Uuid(v) => v,
            SqlParam::TimestampTz(v) => v,
            SqlParam::Timestamp(v) => v,
            SqlParam::Date(v) => v,
            SqlParam::Json(v) => v,
        }
    }
}

/// Borrow a param slice in the shape the driver wants.
pub fn param_refs(params: &[SqlParam]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p.as_dyn()).collect()
}

/// A paged read: page statement + count statement sharing one param set.
#[derive(Debug)]
pub struct BuiltQuery {
    pub page_sql: String,
    pub count_sql: String,
    pub params: Vec<SqlParam>,
    pub limit: u64,
}

/// A single mutation statement.
#[derive(Debug)]
pub struct BuiltStatement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn qualified_table(catalog: &TableCatalog) -> String {
    format!(
        "{}.{}",
        quote_ident(catalog.table.schema()),
        quote_ident(catalog.table.table())
    )
}

/// Placeholder with the cast matching what the driver sends for this type.
fn placeholder(column_type: ColumnType, position: usize) -> String {
    let cast = match column_type {
        ColumnType::Int => "::int8",
        ColumnType::Float => "::float8",
        ColumnType::Numeric => "::numeric",
        ColumnType::Text => "::text",
        _ => "",
    };
    format!("${}{}", position, cast)
}

/// Convert one JSON value into a typed parameter for `column`.
///
/// Values from the text filter channel arrive as strings; values from JSON
/// bodies arrive typed. Both coerce here, in one place.
fn bind_value(value: &JsonValue, column: &ColumnInfo) -> Result<SqlParam, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidValue {
        column: column.name.clone(),
        reason: reason.to_string(),
    };

    match column.column_type {
        ColumnType::Int => match value {
            JsonValue::Number(n) => n
                .as_i64()
                .map(SqlParam::Int)
                .ok_or_else(|| invalid("not an integer")),
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlParam::Int)
                .map_err(|_| invalid("not an integer")),
            _ => Err(invalid("expected an integer")),
        },
        ColumnType::Float => match value {
            JsonValue::Number(n) => n
                .as_f64()
                .map(SqlParam::Float)
                .ok_or_else(|| invalid("not a number")),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(SqlParam::Float)
                .map_err(|_| invalid("not a number")),
            _ => Err(invalid("expected a number")),
        },
        ColumnType::Numeric => {
            // Bound as text and cast server-side; f64 would silently round.
            let text = match value {
                JsonValue::Number(n) => n.to_string(),
                JsonValue::String(s) => s.trim().to_string(),
                _ => return Err(invalid("expected a numeric value")),
            };
            if text.parse::<f64>().is_err() {
                return Err(invalid("not a numeric value"));
            }
            Ok(SqlParam::Text(text))
        }
        ColumnType::Bool => match value {
            JsonValue::Bool(b) => Ok(SqlParam::Bool(*b)),
            JsonValue::String(s) => match s.trim() {
                "true" => Ok(SqlParam::Bool(true)),
                "false" => Ok(SqlParam::Bool(false)),
                _ => Err(invalid("expected true or false")),
            },
            _ => Err(invalid("expected a boolean")),
        },
        ColumnType::Text => match value {
            JsonValue::String(s) => Ok(SqlParam::Text(s.clone())),
            JsonValue::Number(n) => Ok(SqlParam::Text(n.to_string())),
            _ => Err(invalid("expected a string")),
        },
        ColumnType::Uuid => match value {
            JsonValue::String(s) => Uuid::parse_str(s.trim())
                .map(SqlParam::Uuid)
                .map_err(|_| invalid("not a valid uuid")),
            _ => Err(invalid("expected a uuid string")),
        },
        ColumnType::TimestampTz => match value {
            JsonValue::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| SqlParam::TimestampTz(dt.with_timezone(&Utc)))
                .map_err(|_| invalid("not an RFC 3339 timestamp")),
            _ => Err(invalid("expected a timestamp string")),
        },
        ColumnType::Timestamp => match value {
            JsonValue::String(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                    .map(SqlParam::Timestamp)
                    .map_err(|_| invalid("not a timestamp"))
            }
            _ => Err(invalid("expected a timestamp string")),
        },
        ColumnType::Date => match value {
            JsonValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(SqlParam::Date)
                .map_err(|_| invalid("not a date")),
            _ => Err(invalid("expected a date string")),
        },
        ColumnType::Json => Ok(SqlParam::Json(value.clone())),
        ColumnType::Other => Err(invalid("column type does not support bound values")),
    }
}

/// Render the WHERE clause, appending parameters to `params`.
/// Predicates combine with AND; repeated predicates on one column stay
/// independent constraints.
fn build_where(
    catalog: &TableCatalog,
    filters: &[Filter],
    params: &mut Vec<SqlParam>,
) -> Result<String, ValidationError> {
    if filters.is_empty() {
        return Ok(String::new());
    }

    let mut fragments = Vec::with_capacity(filters.len());
    for filter in filters {
        let column = catalog.require_column(&filter.column)?;
        let quoted = quote_ident(&column.name);

        let fragment = match filter.op {
            FilterOp::IsNull => format!("{} IS NULL", quoted),
            FilterOp::NotNull => format!("{} IS NOT NULL", quoted),
            FilterOp::In => {
                let values = filter.value.as_array().ok_or_else(|| {
                    ValidationError::InvalidValue {
                        column: column.name.clone(),
                        reason: "set membership requires a list".to_string(),
                    }
                })?;
                if values.is_empty() {
                    // Empty set matches nothing.
                    "FALSE".to_string()
                } else {
                    let mut placeholders = Vec::with_capacity(values.len());
                    for value in values {
                        params.push(bind_value(value, column)?);
                        placeholders.push(placeholder(column.column_type, params.len()));
                    }
                    format!("{} IN ({})", quoted, placeholders.join(", "))
                }
            }
            op => {
                let operator = match op {
                    FilterOp::Eq => "=",
                    FilterOp::Neq => "<>",
                    FilterOp::Gt => ">",
                    FilterOp::Gte => ">=",
                    FilterOp::Lt => "<",
                    FilterOp::Lte => "<=",
                    FilterOp::Like => "LIKE",
                    FilterOp::Ilike => "ILIKE",
                    // Handled above.
                    FilterOp::In | FilterOp::IsNull | FilterOp::NotNull => unreachable!(),
                };
                params.push(bind_value(&filter.value, column)?);
                format!(
                    "{} {} {}",
                    quoted,
                    operator,
                    placeholder(column.column_type, params.len())
                )
            }
        };
        fragments.push(fragment);
    }

    Ok(format!(" WHERE {}", fragments.join(" AND ")))
}

/// ORDER BY with a deterministic tie-break: requested sort specs first, then
/// any primary-key columns not already named, then physical row identity
/// when the table has no primary key. Identical descriptors therefore
/// paginate identically.
fn build_order_by(catalog: &TableCatalog, descriptor: &QueryDescriptor) -> String {
    let mut terms: Vec<String> = descriptor
        .sort
        .iter()
        .map(|spec| format!("{} {}", quote_ident(&spec.column), spec.direction.as_sql()))
        .collect();

    let named: Vec<&str> = descriptor.sort.iter().map(|s| s.column.as_str()).collect();
    if catalog.primary_key.is_empty() {
        terms.push("ctid ASC".to_string());
    } else {
        for pk in &catalog.primary_key {
            if !named.contains(&pk.as_str()) {
                terms.push(format!("{} ASC", quote_ident(pk)));
            }
        }
    }

    if terms.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", terms.join(", "))
    }
}

/// Build the paged SELECT plus its count twin.
pub fn build_select(
    catalog: &TableCatalog,
    descriptor: &QueryDescriptor,
    settings: &QuerySettings,
) -> Result<BuiltQuery, ValidationError> {
    catalog.validate_descriptor(descriptor)?;

    let selected: Vec<&ColumnInfo> = match &descriptor.columns {
        Some(names) => names
            .iter()
            .map(|name| catalog.require_column(name))
            .collect::<Result<_, _>>()?,
        None => catalog.columns.iter().collect(),
    };

    let select_list = selected
        .iter()
        .map(|column| {
            let quoted = quote_ident(&column.name);
            if column.column_type.selects_as_text() {
                format!("{}::text AS {}", quoted, quoted)
            } else {
                quoted
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let mut params = Vec::new();
    let where_clause = build_where(catalog, &descriptor.filters, &mut params)?;
    let order_by = build_order_by(catalog, descriptor);
    let table = qualified_table(catalog);

    let limit = descriptor
        .limit
        .unwrap_or(settings.default_limit)
        .min(settings.max_limit);

    let page_sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_list, table, where_clause, order_by, limit, descriptor.offset
    );
    let count_sql = format!("SELECT count(*) FROM {}{}", table, where_clause);

    Ok(BuiltQuery {
        page_sql,
        count_sql,
        params,
        limit,
    })
}

/// INSERT one row. Explicit JSON nulls become SQL NULL.
pub fn build_insert(
    catalog: &TableCatalog,
    values: &serde_json::Map<String, JsonValue>,
) -> Result<BuiltStatement, ValidationError> {
    if values.is_empty() {
        return Err(ValidationError::Invalid(
            "insert requires at least one column".to_string(),
        ));
    }

    let mut columns = Vec::with_capacity(values.len());
    let mut rendered = Vec::with_capacity(values.len());
    let mut params = Vec::new();

    for (name, value) in values {
        let column = catalog.require_column(name)?;
        columns.push(quote_ident(&column.name));
        if value.is_null() {
            rendered.push("NULL".to_string());
        } else {
            params.push(bind_value(value, column)?);
            rendered.push(placeholder(column.column_type, params.len()));
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table(catalog),
        columns.join(", "),
        rendered.join(", ")
    );
    Ok(BuiltStatement { sql, params })
}

/// UPDATE matching rows. An empty filter list is refused — a table editor
/// never means "update every row" implicitly.
pub fn build_update(
    catalog: &TableCatalog,
    set: &serde_json::Map<String, JsonValue>,
    filters: &[Filter],
) -> Result<BuiltStatement, ValidationError> {
    if set.is_empty() {
        return Err(ValidationError::Invalid(
            "update requires at least one assignment".to_string(),
        ));
    }
    if filters.is_empty() {
        return Err(ValidationError::Invalid(
            "refusing to update without filters".to_string(),
        ));
    }

    let mut assignments = Vec::with_capacity(set.len());
    let mut params = Vec::new();

    for (name, value) in set {
        let column = catalog.require_column(name)?;
        if value.is_null() {
            assignments.push(format!("{} = NULL", quote_ident(&column.name)));
        } else {
            params.push(bind_value(value, column)?);
            assignments.push(format!(
                "{} = {}",
                quote_ident(&column.name),
                placeholder(column.column_type, params.len())
            ));
        }
    }

    let where_clause = build_where(catalog, filters, &mut params)?;
    let sql = format!(
        "UPDATE {} SET {}{}",
        qualified_table(catalog),
        assignments.join(", "),
        where_clause
    );
    Ok(BuiltStatement { sql, params })
}

/// DELETE matching rows. Same guard as update: no filters, no statement.
pub fn build_delete(
    catalog: &TableCatalog,
    filters: &[Filter],
) -> Result<BuiltStatement, ValidationError> {
    if filters.is_empty() {
        return Err(ValidationError::Invalid(
            "refusing to delete without filters".to_string(),
        ));
    }

    let mut params = Vec::new();
    let where_clause = build_where(catalog, filters, &mut params)?;
    let sql = format!("DELETE FROM {}{}", qualified_table(catalog), where_clause);
    Ok(BuiltStatement { sql, params })
}
