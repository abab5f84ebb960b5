use harbordb_commons::Credentials;
use uuid::Uuid;

/// Generate fresh application-level credentials for a new tenant instance.
///
/// The user name is fixed per platform convention; the password is a random
/// UUID, long enough that brute force against a loopback-only instance is not
/// the weak point.
pub fn generate_credentials(user: &str) -> Credentials {
    Credentials::new(user, Uuid::new_v4().simple().to_string())
}
