//! Free-form SQL endpoint (the SQL-editor surface).
//!
//! Bypasses descriptor validation by design, but still routes through the
//! tenant pool registry, is time-bounded, and surfaces database errors
//! verbatim so the editor can display them.

use crate::models::{error_response, SqlRequest};
use actix_web::{post, web, HttpResponse, Responder};
use harbordb_commons::ProjectId;
use harbordb_core::AppContext;

/// POST /v1/api/sql — `{ query, project_id }` →
/// `{ columns, rows, rows_affected }`.
#[post("/api/sql")]
pub async fn execute_sql(
    ctx: web::Data<AppContext>,
    body: web::Json<SqlRequest>,
) -> impl Responder {
    let project = ProjectId::new(body.project_id.clone());

    match ctx.engine().execute_raw(&project, &body.query).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => error_response(&e),
    }
}
