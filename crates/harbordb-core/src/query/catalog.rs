//! Catalog introspection.
//!
//! The authoritative column set for a table comes from the tenant's own
//! `information_schema`, never from the request. Identifiers only enter SQL
//! text after validating against this allow-list.

use crate::error::{HarborError, Result, ValidationError};
use crate::query::descriptor::{FilterOp, QueryDescriptor};
use harbordb_commons::TableRef;
use serde::Serialize;

/// Coarse type classes driving parameter binding and result decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int,
    Float,
    /// Arbitrary-precision; travels as text to avoid lossy float coercion.
    Numeric,
    Bool,
    Text,
    Uuid,
    TimestampTz,
    Timestamp,
    Date,
    Json,
    /// Everything else (arrays, bytea, ranges, ...): selectable as text,
    /// not filterable.
    Other,
}

impl ColumnType {
    /// Map an `information_schema.columns.data_type` label.
    pub fn from_pg(data_type: &str) -> Self {
        match data_type {
            "smallint" | "integer" | "bigint" => ColumnType::Int,
            "real" | "double precision" => ColumnType::Float,
            "numeric" => ColumnType::Numeric,
            "boolean" => ColumnType::Bool,
            "text" | "character varying" | "character" | "name" => ColumnType::Text,
            "uuid" => ColumnType::Uuid,
            "timestamp with time zone" => ColumnType::TimestampTz,
            "timestamp without time zone" => ColumnType::Timestamp,
            "date" => ColumnType::Date,
            "json" | "jsonb" => ColumnType::Json,
            _ => ColumnType::Other,
        }
    }

    /// Types that must be selected as `::text` because the driver has no
    /// native decoding for them.
    pub fn selects_as_text(&self) -> bool {
        matches!(self, ColumnType::Numeric | ColumnType::Other)
    }

    pub fn filterable(&self) -> bool {
        !matches!(self, ColumnType::Other)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Raw `data_type` label, surfaced to schema browsers.
    pub data_type: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub ordinal: i32,
}

/// Snapshot of one table's catalog: columns in ordinal order plus the
/// primary key (the implicit sort tie-break).
#[derive(Debug, Clone, Serialize)]
pub struct TableCatalog {
    pub table: TableRef,
    pub columns: Vec<ColumnInfo>,
    pub primary_key: Vec<String>,
}

impl TableCatalog {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub(crate) fn require_column(
        &self,
        name: &str,
    ) -> std::result::Result<&ColumnInfo, ValidationError> {
        self.column(name).ok_or_else(|| ValidationError::UnknownColumn {
            table: self.table.to_string(),
            column: name.to_string(),
        })
    }

    /// Validate every identifier and operator in a descriptor against this
    /// catalog. Nothing reaches SQL text before this passes.
    pub fn validate_descriptor(
        &self,
        descriptor: &QueryDescriptor,
    ) -> std::result::Result<(), ValidationError> {
        if let Some(columns) = &descriptor.columns {
            for name in columns {
                self.require_column(name)?;
            }
        }

        for filter in &descriptor.filters {
            let column = self.require_column(&filter.column)?;
            let op_ok = match filter.op {
                FilterOp::IsNull | FilterOp::NotNull => true,
                FilterOp::Like | FilterOp::Ilike => column.column_type == ColumnType::Text,
                _ => column.column_type.filterable(),
            };
            if !op_ok {
                return Err(ValidationError::OperatorTypeMismatch {
                    operator: filter.op.as_str().to_string(),
                    column: column.name.clone(),
                    data_type: column.data_type.clone(),
                });
            }
        }

        for spec in &descriptor.sort {
            self.require_column(&spec.column)?;
        }

        Ok(())
    }
}

pub(crate) const COLUMNS_SQL: &str = "SELECT c.column_name, c.data_type, c.is_nullable, c.ordinal_position::int4 \
     FROM information_schema.columns c \
     WHERE c.table_schema = $1 AND c.table_name = $2 \
     ORDER BY c.ordinal_position";

pub(crate) const PRIMARY_KEY_SQL: &str = "SELECT a.attname \
     FROM pg_index i \
     JOIN pg_class t ON t.oid = i.indrelid \
     JOIN pg_namespace n ON n.oid = t.relnamespace \
     JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
     WHERE n.nspname = $1 AND t.relname = $2 AND i.indisprimary \
     ORDER BY array_position(i.indkey, a.attnum)";

/// Introspect one table. Fails with `ValidationError::UnknownTable` when the
/// table has no columns in `information_schema` (absent or not visible).
pub async fn introspect(client: &tokio_postgres::Client, table: &TableRef) -> Result<TableCatalog> {
    let rows = client
        .query(COLUMNS_SQL, &[&table.schema(), &table.table()])
        .await
        .map_err(|e| HarborError::execution(e.to_string()))?;

    if rows.is_empty() {
        return Err(ValidationError::UnknownTable(table.to_string()).into());
    }

    let columns = rows
        .iter()
        .map(|row| {
            let name: String = row.get(0);
            let data_type: String = row.get(1);
            let is_nullable: String = row.get(2);
            let ordinal: i32 = row.get(3);
            ColumnInfo {
                column_type: ColumnType::from_pg(&data_type),
                name,
                data_type,
                nullable: is_nullable == "YES",
                ordinal,
            }
        })
        .collect();

    let pk_rows = client
        .query(PRIMARY_KEY_SQL, &[&table.schema(), &table.table()])
        .await
        .map_err(|e| HarborError::execution(e.to_string()))?;
    let primary_key = pk_rows.iter().map(|row| row.get(0)).collect();

    Ok(TableCatalog {
        table: table.clone(),
        columns,
        primary_key,
    })
}

#[cfg(test)]
pub(crate) fn test_catalog() -> TableCatalog {
    let make = |name: &str, data_type: &str, ordinal: i32| ColumnInfo {
        name: name.to_string(),
        data_type: data_type.to_string(),
        column_type: ColumnType::from_pg(data_type),
        nullable: name != "id",
        ordinal,
    };
    TableCatalog {
        table: TableRef::new("public", "t"),
        columns: vec![
            make("id", "integer", 1),
            make("name", "text", 2),
            make("price", "numeric", 3),
            make("created_at", "timestamp with time zone", 4),
            make("payload", "jsonb", 5),
            make("raw", "bytea", 6),
        ],
        primary_key: vec!["id".to_string()],
    }
}
