//! Row mutation endpoints. Every mutation executes through the tenant pool
//! and invalidates its cache tags before the response goes out, so the next
//! read reflects the write.

use crate::models::{error_response, validation_response, DeleteBody, MutationResponse, UpdateBody};
use actix_web::{delete, patch, post, web, HttpResponse, Responder};
use harbordb_commons::{ProjectId, TableRef};
use harbordb_core::query::parse_filter_channel;
use harbordb_core::AppContext;
use serde_json::Value as JsonValue;

/// POST /v1/projects/{project}/tables/{schema}/{table}/rows
#[post("/projects/{project}/tables/{schema}/{table}/rows")]
pub async fn insert_row(
    ctx: web::Data<AppContext>,
    path: web::Path<(String, String, String)>,
    body: web::Json<serde_json::Map<String, JsonValue>>,
) -> impl Responder {
    let (project, schema, table) = path.into_inner();
    let project = ProjectId::new(project);
    let table = TableRef::new(schema, table);

    match ctx.engine().insert_row(&project, &table, &body).await {
        Ok(rows_affected) => HttpResponse::Created().json(MutationResponse { rows_affected }),
        Err(e) => error_response(&e),
    }
}

/// PATCH /v1/projects/{project}/tables/{schema}/{table}/rows
#[patch("/projects/{project}/tables/{schema}/{table}/rows")]
pub async fn update_rows(
    ctx: web::Data<AppContext>,
    path: web::Path<(String, String, String)>,
    body: web::Json<UpdateBody>,
) -> impl Responder {
    let (project, schema, table) = path.into_inner();
    let project = ProjectId::new(project);
    let table = TableRef::new(schema, table);

    let filters = match parse_filter_channel(&body.filter) {
        Ok(filters) => filters,
        Err(e) => return validation_response(&e),
    };

    match ctx
        .engine()
        .update_rows(&project, &table, &body.set, &filters)
        .await
    {
        Ok(rows_affected) => HttpResponse::Ok().json(MutationResponse { rows_affected }),
        Err(e) => error_response(&e),
    }
}

/// DELETE /v1/projects/{project}/tables/{schema}/{table}/rows
#[delete("/projects/{project}/tables/{schema}/{table}/rows")]
pub async fn delete_rows(
    ctx: web::Data<AppContext>,
    path: web::Path<(String, String, String)>,
    body: web::Json<DeleteBody>,
) -> impl Responder {
    let (project, schema, table) = path.into_inner();
    let project = ProjectId::new(project);
    let table = TableRef::new(schema, table);

    let filters = match parse_filter_channel(&body.filter) {
        Ok(filters) => filters,
        Err(e) => return validation_response(&e),
    };

    match ctx.engine().delete_rows(&project, &table, &filters).await {
        Ok(rows_affected) => HttpResponse::Ok().json(MutationResponse { rows_affected }),
        Err(e) => error_response(&e),
    }
}
