// Error types module
use harbordb_commons::ProjectId;
use thiserror::Error;

/// Main error type for HarborDB core operations.
///
/// Validation and execution errors carry the underlying message verbatim so a
/// SQL-editor-style caller can display it. Provisioning and pool errors are
/// infrastructure failures; callers surface a generic "service unavailable"
/// message plus a correlation id and the detail stays in the logs.
#[derive(Error, Debug)]
pub enum HarborError {
    #[error("Provisioning failed for project '{project}': {source}")]
    Provisioning {
        project: ProjectId,
        #[source]
        source: ProvisioningError,
    },

    #[error("Pool acquisition failed for project '{project}': {reason}")]
    PoolAcquisition { project: ProjectId, reason: String },

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Query timed out after {elapsed_ms}ms on project '{project}'")]
    QueryTimeout { project: ProjectId, elapsed_ms: u64 },

    #[error("Execution error: {message}")]
    Execution { message: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("Metadata store error: {0}")]
    Directory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl HarborError {
    pub fn provisioning(project: ProjectId, source: ProvisioningError) -> Self {
        Self::Provisioning { project, source }
    }

    pub fn pool_acquisition(project: ProjectId, reason: impl Into<String>) -> Self {
        Self::PoolAcquisition {
            project,
            reason: reason.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// True for failures worth retrying after backoff (infrastructure),
    /// false for logical errors that will fail identically on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarborError::Provisioning { .. }
                | HarborError::PoolAcquisition { .. }
                | HarborError::QueryTimeout { .. }
        )
    }
}

/// Instance provisioning failures.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("No free port found after {attempts} attempts")]
    PortExhausted { attempts: u32 },

    #[error("initdb failed: {0}")]
    InitFailed(String),

    #[error("Database server process failed to start: {0}")]
    SpawnFailed(String),

    #[error("Instance never became reachable after {attempts} attempts: {last_error}")]
    NeverReachable { attempts: u32, last_error: String },

    #[error("Instance stopped unexpectedly: {0}")]
    Stopped(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Descriptor validation failures.
///
/// These are never retried and never issue SQL against the tenant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown schema: '{0}'")]
    UnknownSchema(String),

    #[error("Unknown table: '{0}'")]
    UnknownTable(String),

    #[error("Unknown column: '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Unsupported operator: '{0}'")]
    UnsupportedOperator(String),

    #[error("Operator '{operator}' cannot apply to column '{column}' of type {data_type}")]
    OperatorTypeMismatch {
        operator: String,
        column: String,
        data_type: String,
    },

    #[error("Invalid value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Malformed filter entry '{entry}': {reason}")]
    MalformedFilter { entry: String, reason: String },

    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, HarborError>;
