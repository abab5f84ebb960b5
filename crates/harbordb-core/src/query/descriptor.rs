//! Typed query descriptors.
//!
//! A descriptor is the validated representation of a read request: target
//! table, requested columns, filter predicates, sort specs, and paging.
//! Requests arriving over loosely-typed channels (query strings, the
//! `column:operator:value` filter encoding) are parsed into this shape once,
//! at the boundary — partially-validated data never flows deeper.

use crate::error::ValidationError;
use harbordb_commons::TableRef;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Filter operators. Each maps to one fixed SQL fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    IsNull,
    NotNull,
}

impl FilterOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(FilterOp::Eq),
            "neq" => Some(FilterOp::Neq),
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            "like" => Some(FilterOp::Like),
            "ilike" => Some(FilterOp::Ilike),
            "in" => Some(FilterOp::In),
            "is_null" => Some(FilterOp::IsNull),
            "not_null" => Some(FilterOp::NotNull),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::Ilike => "ilike",
            FilterOp::In => "in",
            FilterOp::IsNull => "is_null",
            FilterOp::NotNull => "not_null",
        }
    }

    /// Null checks carry no comparison value.
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterOp::IsNull | FilterOp::NotNull)
    }
}

/// One predicate. Predicates on the same column stay independent ANDed
/// constraints; they are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: JsonValue,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: JsonValue) -> Self {
        Self {
            column: column.into(),
            op,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// The validated, typed representation of a read request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub table: TableRef,
    /// None = all columns from the introspected catalog.
    pub columns: Option<Vec<String>>,
    pub filters: Vec<Filter>,
    pub sort: Vec<SortSpec>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl QueryDescriptor {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: None,
            filters: Vec::new(),
            sort: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Deterministic cache-key component. Identical descriptors always
    /// fingerprint identically; field order is fixed by the struct.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Parse the `column:operator:value;column:operator:value` text channel.
///
/// Policy: one malformed entry rejects the whole request. Silently dropping
/// a predicate would widen the result set past what the caller asked for.
pub fn parse_filter_channel(raw: &str) -> Result<Vec<Filter>, ValidationError> {
    let mut filters = Vec::new();

    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue; // trailing or doubled separator
        }

        let mut parts = entry.splitn(3, ':');
        let column = parts.next().unwrap_or_default().trim();
        let op_text = parts.next();
        let value_text = parts.next();

        if column.is_empty() {
            return Err(ValidationError::MalformedFilter {
                entry: entry.to_string(),
                reason: "missing column name".to_string(),
            });
        }

        let op_text = op_text.ok_or_else(|| ValidationError::MalformedFilter {
            entry: entry.to_string(),
            reason: "missing operator".to_string(),
        })?;
        let op = FilterOp::parse(op_text.trim()).ok_or_else(|| ValidationError::MalformedFilter {
            entry: entry.to_string(),
            reason: format!("unsupported operator '{}'", op_text.trim()),
        })?;

        let value = match (op.takes_value(), value_text) {
            (false, None) => JsonValue::Null,
            (false, Some(extra)) if extra.trim().is_empty() => JsonValue::Null,
            (false, Some(extra)) => {
                return Err(ValidationError::MalformedFilter {
                    entry: entry.to_string(),
                    reason: format!("operator '{}' takes no value, got '{}'", op.as_str(), extra),
                });
            }
            (true, None) => {
                return Err(ValidationError::MalformedFilter {
                    entry: entry.to_string(),
                    reason: format!("operator '{}' requires a value", op.as_str()),
                });
            }
            (true, Some(text)) if op == FilterOp::In => JsonValue::Array(
                text.split(',')
                    .map(|v| JsonValue::String(v.trim().to_string()))
                    .collect(),
            ),
            (true, Some(text)) => JsonValue::String(text.to_string()),
        };

        filters.push(Filter::new(column, op, value));
    }

    Ok(filters)
}

/// Parse the `column:direction;column:direction` sort channel.
/// Direction defaults to ascending when omitted.
pub fn parse_sort_channel(raw: &str) -> Result<Vec<SortSpec>, ValidationError> {
    let mut specs = Vec::new();

    for entry in raw.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let mut parts = entry.splitn(2, ':');
        let column = parts.next().unwrap_or_default().trim();
        if column.is_empty() {
            return Err(ValidationError::MalformedFilter {
                entry: entry.to_string(),
                reason: "missing sort column".to_string(),
            });
        }

        let direction = match parts.next().map(|d| d.trim()) {
            None | Some("") | Some("asc") => SortDirection::Ascending,
            Some("desc") => SortDirection::Descending,
            Some(other) => {
                return Err(ValidationError::MalformedFilter {
                    entry: entry.to_string(),
                    reason: format!("unknown sort direction '{}'", other),
                });
            }
        };

        specs.push(SortSpec {
            column: column.to_string(),
            direction,
        });
    }

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter_channel_happy_path() {
        let filters = parse_filter_channel("name:eq:b;age:gte:21").unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].column, "name");
        assert_eq!(filters[0].op, FilterOp::Eq);
        assert_eq!(filters[0].value, JsonValue::String("b".to_string()));
        assert_eq!(filters[1].op, FilterOp::Gte);
    }

    #[test]
    fn test_parse_filter_channel_value_may_contain_colon() {
        // splitn(3) keeps everything after the second colon as the value.
        let filters = parse_filter_channel("created_at:gte:2026-01-01T00:00:00Z").unwrap();
        assert_eq!(
            filters[0].value,
            JsonValue::String("2026-01-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_parse_filter_channel_in_list() {
        let filters = parse_filter_channel("status:in:new,open,closed").unwrap();
        assert_eq!(
            filters[0].value,
            serde_json::json!(["new", "open", "closed"])
        );
    }

    #[test]
    fn test_parse_filter_channel_null_checks() {
        let filters = parse_filter_channel("deleted_at:is_null;name:not_null:").unwrap();
        assert_eq!(filters[0].op, FilterOp::IsNull);
        assert_eq!(filters[1].op, FilterOp::NotNull);
    }

    #[test]
    fn test_malformed_entry_rejects_whole_request() {
        // One bad entry among good ones: the request fails, nothing is dropped.
        let err = parse_filter_channel("name:eq:b;age:between:1,9").unwrap_err();
        match err {
            ValidationError::MalformedFilter { entry, reason } => {
                assert_eq!(entry, "age:between:1,9");
                assert!(reason.contains("between"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(parse_filter_channel("name").is_err());
        assert!(parse_filter_channel(":eq:x").is_err());
        assert!(parse_filter_channel("age:gt").is_err());
    }

    #[test]
    fn test_empty_and_trailing_separators_are_fine() {
        assert!(parse_filter_channel("").unwrap().is_empty());
        assert_eq!(parse_filter_channel("name:eq:b;").unwrap().len(), 1);
    }

    #[test]
    fn test_parse_sort_channel() {
        let specs = parse_sort_channel("id;name:desc;age:asc").unwrap();
        assert_eq!(specs[0], SortSpec::asc("id"));
        assert_eq!(specs[1], SortSpec::desc("name"));
        assert_eq!(specs[2], SortSpec::asc("age"));

        assert!(parse_sort_channel("name:sideways").is_err());
    }

    #[test]
    fn test_fingerprint_is_stable_and_distinguishes() {
        let table = TableRef::new("public", "t");
        let a = QueryDescriptor::new(table.clone());
        let mut b = QueryDescriptor::new(table);
        assert_eq!(a.fingerprint(), a.fingerprint());
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.limit = Some(10);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
