//! Generic query engine.
//!
//! Declarative read requests (schema, table, columns, filters, sort, paging)
//! compile into parameterized SQL against a tenant pool and come back as
//! column-oriented pages with an authoritative total row count.

pub mod builder;
pub mod catalog;
pub mod descriptor;
mod engine;
mod values;

pub use catalog::{ColumnInfo, ColumnType, TableCatalog};
pub use descriptor::{
    parse_filter_channel, parse_sort_channel, Filter, FilterOp, QueryDescriptor, SortDirection,
    SortSpec,
};
pub use engine::{ColumnarPage, QueryEngine, RawQueryResult};
