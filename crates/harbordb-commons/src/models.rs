//! Tenant models.
//!
//! A tenant is one project's isolated database instance plus the locator and
//! credentials needed to reach it. Exactly one active instance exists per
//! project at a time.

use crate::ids::ProjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network locator of a tenant's database instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub host: String,
    pub port: u16,
}

impl Locator {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Application-level credentials for a tenant database.
///
/// The password never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lifecycle state of a tenant's database instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    /// No instance has ever been started for this project.
    Unprovisioned,
    /// An instance is being started; not yet accepting connections.
    Starting,
    /// The instance accepted an authenticated connection.
    Ready,
    /// The last provisioning attempt failed; retryable.
    Failed,
}

impl ProvisioningState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningState::Unprovisioned => "unprovisioned",
            ProvisioningState::Starting => "starting",
            ProvisioningState::Ready => "ready",
            ProvisioningState::Failed => "failed",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the platform knows about one tenant's database instance.
///
/// This is the record shape consumed from the external metadata store; the
/// core never defines that store's schema, only this view of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub project_id: ProjectId,
    pub locator: Locator,
    pub db_name: String,
    pub credentials: Credentials,
    pub state: ProvisioningState,
}

impl TenantRecord {
    /// True when the instance is expected to accept connections.
    pub fn is_ready(&self) -> bool {
        self.state == ProvisioningState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(ProvisioningState::Unprovisioned.as_str(), "unprovisioned");
        assert_eq!(ProvisioningState::Ready.to_string(), "ready");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("app", "s3cret");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_record_readiness() {
        let mut record = TenantRecord {
            project_id: ProjectId::new("p1"),
            locator: Locator::new("127.0.0.1", 54321),
            db_name: "app".to_string(),
            credentials: Credentials::new("app", "pw"),
            state: ProvisioningState::Starting,
        };
        assert!(!record.is_ready());
        record.state = ProvisioningState::Ready;
        assert!(record.is_ready());
    }
}
