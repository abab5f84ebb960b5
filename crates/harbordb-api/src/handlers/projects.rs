//! Project (tenant) lifecycle endpoints.

use crate::models::{error_response, StatusResponse};
use actix_web::{delete, get, post, web, HttpResponse, Responder};
use harbordb_commons::ProjectId;
use harbordb_core::cache::Mutation;
use harbordb_core::provision::ProvisionOutcome;
use harbordb_core::AppContext;

/// POST /v1/projects/{project}/provision
///
/// Idempotent: an already-running instance reports 200, a fresh start 201.
#[post("/projects/{project}/provision")]
pub async fn provision_project(
    ctx: web::Data<AppContext>,
    path: web::Path<String>,
) -> impl Responder {
    let project = ProjectId::new(path.into_inner());

    match ctx.provisioner().provision(&project).await {
        Ok(ProvisionOutcome::Provisioned(record)) => HttpResponse::Created().json(StatusResponse {
            project_id: project.to_string(),
            state: record.state.to_string(),
        }),
        Ok(ProvisionOutcome::AlreadyProvisioned(record)) => HttpResponse::Ok().json(StatusResponse {
            project_id: project.to_string(),
            state: record.state.to_string(),
        }),
        Err(e) => error_response(&e),
    }
}

/// GET /v1/projects/{project}/status
#[get("/projects/{project}/status")]
pub async fn project_status(
    ctx: web::Data<AppContext>,
    path: web::Path<String>,
) -> impl Responder {
    let project = ProjectId::new(path.into_inner());

    match ctx.provisioner().status(&project).await {
        Ok(Some(state)) => HttpResponse::Ok().json(StatusResponse {
            project_id: project.to_string(),
            state: state.to_string(),
        }),
        Ok(None) => HttpResponse::NotFound().finish(),
        Err(e) => error_response(&e),
    }
}

/// DELETE /v1/projects/{project}
///
/// Stops the instance, discards locator and credentials, closes pools, and
/// expires every cached read for the project.
#[delete("/projects/{project}")]
pub async fn delete_project(
    ctx: web::Data<AppContext>,
    path: web::Path<String>,
) -> impl Responder {
    let project = ProjectId::new(path.into_inner());

    match ctx.provisioner().stop(&project).await {
        Ok(found) => {
            ctx.registry().mark_broken(&project);
            ctx.coordinator().apply(&Mutation::TenantRemoved {
                project: project.clone(),
            });
            if found {
                HttpResponse::NoContent().finish()
            } else {
                HttpResponse::NotFound().finish()
            }
        }
        Err(e) => error_response(&e),
    }
}
