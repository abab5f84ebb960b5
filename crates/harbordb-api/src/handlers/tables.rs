//! Read endpoints: table listing, column introspection, descriptor rows.

use crate::models::{error_response, validation_response, RowsParams, TableListResponse};
use actix_web::{get, web, HttpResponse, Responder};
use harbordb_commons::{ProjectId, TableRef};
use harbordb_core::query::{parse_filter_channel, parse_sort_channel, QueryDescriptor};
use harbordb_core::{AppContext, ValidationError};

/// Build a typed descriptor from the loosely-typed query string. This is the
/// single point where the text channels become a validated value.
pub(crate) fn descriptor_from_params(
    schema: &str,
    table: &str,
    params: &RowsParams,
) -> Result<QueryDescriptor, ValidationError> {
    let mut descriptor = QueryDescriptor::new(TableRef::new(schema, table));

    if let Some(columns) = &params.columns {
        let names: Vec<String> = columns
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if !names.is_empty() {
            descriptor.columns = Some(names);
        }
    }
    if let Some(filter) = &params.filter {
        descriptor.filters = parse_filter_channel(filter)?;
    }
    if let Some(sort) = &params.sort {
        descriptor.sort = parse_sort_channel(sort)?;
    }
    descriptor.limit = params.limit;
    descriptor.offset = params.offset.unwrap_or(0);

    Ok(descriptor)
}

#[derive(Debug, serde::Deserialize)]
pub struct TableListParams {
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    "public".to_string()
}

/// GET /v1/projects/{project}/tables?schema=
#[get("/projects/{project}/tables")]
pub async fn list_tables(
    ctx: web::Data<AppContext>,
    path: web::Path<String>,
    params: web::Query<TableListParams>,
) -> impl Responder {
    let project = ProjectId::new(path.into_inner());

    match ctx.engine().list_tables(&project, &params.schema).await {
        Ok(tables) => HttpResponse::Ok().json(TableListResponse {
            schema: params.schema.clone(),
            tables: tables.as_ref().clone(),
        }),
        Err(e) => error_response(&e),
    }
}

/// GET /v1/projects/{project}/tables/{schema}/{table}/columns
#[get("/projects/{project}/tables/{schema}/{table}/columns")]
pub async fn table_columns(
    ctx: web::Data<AppContext>,
    path: web::Path<(String, String, String)>,
) -> impl Responder {
    let (project, schema, table) = path.into_inner();
    let project = ProjectId::new(project);
    let table = TableRef::new(schema, table);

    match ctx.engine().table_columns(&project, &table).await {
        Ok(catalog) => HttpResponse::Ok().json(&*catalog),
        Err(e) => error_response(&e),
    }
}

/// GET /v1/projects/{project}/tables/{schema}/{table}/rows
///
/// Responds `{rows: column-oriented map, row_count}`.
#[get("/projects/{project}/tables/{schema}/{table}/rows")]
pub async fn get_rows(
    ctx: web::Data<AppContext>,
    path: web::Path<(String, String, String)>,
    params: web::Query<RowsParams>,
) -> impl Responder {
    let (project, schema, table) = path.into_inner();
    let project = ProjectId::new(project);

    let descriptor = match descriptor_from_params(&schema, &table, &params) {
        Ok(d) => d,
        Err(e) => return validation_response(&e),
    };

    match ctx.engine().query(&project, &descriptor).await {
        Ok(page) => HttpResponse::Ok().json(&*page),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(filter: Option<&str>, sort: Option<&str>) -> RowsParams {
        RowsParams {
            columns: Some("id, name".to_string()),
            filter: filter.map(str::to_string),
            sort: sort.map(str::to_string),
            limit: Some(2),
            offset: None,
        }
    }

    #[test]
    fn test_descriptor_from_params() {
        let descriptor =
            descriptor_from_params("public", "t", &params(Some("name:eq:b"), Some("id"))).unwrap();
        assert_eq!(descriptor.table, TableRef::new("public", "t"));
        assert_eq!(
            descriptor.columns,
            Some(vec!["id".to_string(), "name".to_string()])
        );
        assert_eq!(descriptor.filters.len(), 1);
        assert_eq!(descriptor.sort.len(), 1);
        assert_eq!(descriptor.limit, Some(2));
        assert_eq!(descriptor.offset, 0);
    }

    #[test]
    fn test_malformed_filter_rejects_request() {
        let err = descriptor_from_params("public", "t", &params(Some("name~b"), None)).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedFilter { .. }));
    }
}
