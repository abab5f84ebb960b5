//! API routes configuration.
//!
//! All endpoints use the /v1 version prefix:
//! - GET    /v1/projects/{project}/tables - list tables in a schema
//! - GET    /v1/projects/{project}/tables/{schema}/{table}/columns - column introspection
//! - GET    /v1/projects/{project}/tables/{schema}/{table}/rows - descriptor query
//! - POST   /v1/projects/{project}/tables/{schema}/{table}/rows - insert a row
//! - PATCH  /v1/projects/{project}/tables/{schema}/{table}/rows - update matching rows
//! - DELETE /v1/projects/{project}/tables/{schema}/{table}/rows - delete matching rows
//! - POST   /v1/projects/{project}/provision - start the project's instance
//! - GET    /v1/projects/{project}/status - provisioning state
//! - DELETE /v1/projects/{project} - stop instance, discard tenant
//! - POST   /v1/api/sql - free-form SQL (requires a project_id in the body)
//! - GET    /v1/api/healthcheck - health check endpoint

use crate::handlers;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// Configure API routes for HarborDB
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .service(handlers::list_tables)
            .service(handlers::table_columns)
            .service(handlers::get_rows)
            .service(handlers::insert_row)
            .service(handlers::update_rows)
            .service(handlers::delete_rows)
            .service(handlers::provision_project)
            .service(handlers::project_status)
            .service(handlers::delete_project)
            .service(handlers::execute_sql)
            .route("/api/healthcheck", web::get().to(healthcheck_handler)),
    );
}

/// Health check endpoint handler
async fn healthcheck_handler() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": "v1"
    }))
}
