use crate::error::Result;
use async_trait::async_trait;
use harbordb_commons::{ProjectId, ProvisioningState, TenantRecord};

/// Read/write access to per-project locators, credentials, and state.
///
/// This is the boundary to the external metadata store; the core does not
/// define that store's schema. Reads may run concurrently from many callers.
/// Writes happen only on provisioning and credential-rotation paths, which
/// serialize per tenant (the provisioner holds a per-project lock around its
/// read-modify-write sequences).
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Fetch the record for a project, if the project is known.
    async fn get_tenant_record(&self, project: &ProjectId) -> Result<Option<TenantRecord>>;

    /// Update only the provisioning state of an existing record.
    async fn update_tenant_state(&self, project: &ProjectId, state: ProvisioningState)
        -> Result<()>;

    /// Insert or replace the full record.
    async fn put_tenant_record(&self, record: TenantRecord) -> Result<()>;

    /// Discard the record entirely (project deletion).
    async fn remove_tenant_record(&self, project: &ProjectId) -> Result<()>;
}
