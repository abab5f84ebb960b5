//! Pool cache keys.
//!
//! A pool is keyed by the tenant's locator plus a fingerprint of its
//! credentials. Rotating credentials changes the fingerprint, which changes
//! the key — the registry then builds a fresh pool instead of serving the
//! stale one.

use harbordb_commons::{Credentials, ProjectId, TenantRecord};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub project: ProjectId,
    pub host: String,
    pub port: u16,
    pub db_name: String,
    pub credential_fingerprint: String,
}

impl PoolKey {
    pub fn for_record(record: &TenantRecord) -> Self {
        Self {
            project: record.project_id.clone(),
            host: record.locator.host.clone(),
            port: record.locator.port,
            db_name: record.db_name.clone(),
            credential_fingerprint: fingerprint(&record.credentials),
        }
    }
}

/// SHA-256 over user and password, NUL-separated so `("ab","c")` and
/// `("a","bc")` cannot collide. Only the digest is ever held in the key, so
/// keys are safe to log.
fn fingerprint(credentials: &Credentials) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credentials.user.as_bytes());
    hasher.update([0u8]);
    hasher.update(credentials.password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbordb_commons::{Locator, ProvisioningState};

    fn record(password: &str) -> TenantRecord {
        TenantRecord {
            project_id: ProjectId::new("p1"),
            locator: Locator::new("127.0.0.1", 55001),
            db_name: "app".to_string(),
            credentials: Credentials::new("app", password),
            state: ProvisioningState::Ready,
        }
    }

    #[test]
    fn test_same_record_same_key() {
        assert_eq!(
            PoolKey::for_record(&record("pw")),
            PoolKey::for_record(&record("pw"))
        );
    }

    #[test]
    fn test_credential_rotation_changes_key() {
        assert_ne!(
            PoolKey::for_record(&record("old")),
            PoolKey::for_record(&record("new"))
        );
    }

    #[test]
    fn test_fingerprint_field_boundaries() {
        let a = fingerprint(&Credentials::new("ab", "c"));
        let b = fingerprint(&Credentials::new("a", "bc"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_never_exposes_password() {
        let key = PoolKey::for_record(&record("s3cret"));
        assert!(!format!("{:?}", key).contains("s3cret"));
    }
}
