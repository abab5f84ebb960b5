//! Request and response models for the HarborDB API.

use actix_web::HttpResponse;
use harbordb_core::{HarborError, ValidationError};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Error code enum for type-safe error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Descriptor referenced an unknown identifier or unsupported operator
    ValidationError,
    /// Runtime SQL error (constraint violation, free-form query failure)
    SqlExecutionError,
    /// Statement exceeded its deadline
    QueryTimeout,
    /// Project is not known to the platform
    ProjectNotFound,
    /// Instance or pool unavailable; retry later
    ProjectUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::SqlExecutionError => "SQL_EXECUTION_ERROR",
            ErrorCode::QueryTimeout => "QUERY_TIMEOUT",
            ErrorCode::ProjectNotFound => "PROJECT_NOT_FOUND",
            ErrorCode::ProjectUnavailable => "PROJECT_UNAVAILABLE",
        }
    }
}

/// Error payload. `message` is the underlying error verbatim for validation
/// and execution failures, a generic line for infrastructure failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ErrorResponse {
    fn new(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
            correlation_id: None,
        }
    }
}

/// Map a core error to its HTTP response.
///
/// Infrastructure failures log their full detail under a fresh correlation
/// id and return only the id to the caller.
pub fn error_response(err: &HarborError) -> HttpResponse {
    match err {
        HarborError::Validation(validation) => HttpResponse::BadRequest()
            .json(ErrorResponse::new(ErrorCode::ValidationError, validation.to_string())),
        HarborError::Execution { message } => HttpResponse::BadRequest()
            .json(ErrorResponse::new(ErrorCode::SqlExecutionError, message.clone())),
        HarborError::QueryTimeout { .. } => HttpResponse::GatewayTimeout()
            .json(ErrorResponse::new(ErrorCode::QueryTimeout, err.to_string())),
        HarborError::ProjectNotFound(project) => HttpResponse::NotFound().json(
            ErrorResponse::new(ErrorCode::ProjectNotFound, format!("Project not found: {}", project)),
        ),
        HarborError::Provisioning { .. }
        | HarborError::PoolAcquisition { .. }
        | HarborError::Directory(_)
        | HarborError::Io(_)
        | HarborError::Other(_) => {
            let correlation_id = Uuid::new_v4().to_string();
            error!("[{}] {}", correlation_id, err);
            HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error_code: ErrorCode::ProjectUnavailable,
                message: "Service unavailable for this project; retry later".to_string(),
                correlation_id: Some(correlation_id),
            })
        }
    }
}

/// Shortcut for boundary-level validation failures.
pub fn validation_response(err: &ValidationError) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse::new(
        ErrorCode::ValidationError,
        err.to_string(),
    ))
}

/// Query parameters of the rows endpoint. `filter` and `sort` use the
/// `column:operator:value;...` / `column:direction;...` text encodings.
#[derive(Debug, Deserialize)]
pub struct RowsParams {
    /// Comma-separated column names; absent = all columns.
    pub columns: Option<String>,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Body of the row-insert endpoint: column name → value.
pub type InsertBody = serde_json::Map<String, JsonValue>;

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    pub set: serde_json::Map<String, JsonValue>,
    /// Text-encoded filter; required — unfiltered updates are refused.
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    pub filter: String,
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub rows_affected: u64,
}

/// Free-form SQL request: `{ query, project_id }`.
#[derive(Debug, Deserialize)]
pub struct SqlRequest {
    pub query: String,
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub schema: String,
    pub tables: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub project_id: String,
    pub state: String,
}
