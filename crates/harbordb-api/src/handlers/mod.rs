//! HTTP handlers.

mod projects;
mod rows;
mod sql;
mod tables;

pub use projects::{delete_project, project_status, provision_project};
pub use rows::{delete_rows, insert_row, update_rows};
pub use sql::execute_sql;
pub use tables::{get_rows, list_tables, table_columns};
