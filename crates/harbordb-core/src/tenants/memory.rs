use super::TenantDirectory;
use crate::error::{HarborError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use harbordb_commons::{ProjectId, ProvisioningState, TenantRecord};

/// In-memory tenant directory.
///
/// Backs embedded deployments and tests. Entry-level locking comes from the
/// map shards; cross-call serialization per tenant is the provisioner's job.
#[derive(Default)]
pub struct InMemoryTenantDirectory {
    records: DashMap<ProjectId, TenantRecord>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known tenants.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn get_tenant_record(&self, project: &ProjectId) -> Result<Option<TenantRecord>> {
        Ok(self.records.get(project).map(|r| r.value().clone()))
    }

    async fn update_tenant_state(
        &self,
        project: &ProjectId,
        state: ProvisioningState,
    ) -> Result<()> {
        match self.records.get_mut(project) {
            Some(mut record) => {
                record.state = state;
                Ok(())
            }
            None => Err(HarborError::ProjectNotFound(project.clone())),
        }
    }

    async fn put_tenant_record(&self, record: TenantRecord) -> Result<()> {
        self.records.insert(record.project_id.clone(), record);
        Ok(())
    }

    async fn remove_tenant_record(&self, project: &ProjectId) -> Result<()> {
        self.records.remove(project);
        Ok(())
    }
}
