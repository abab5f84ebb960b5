//! Instance provisioning: one isolated database process per project.
//!
//! `provision` allocates a collision-free port, initializes a private data
//! directory, spawns the server process, and polls an authenticated
//! connection with bounded backoff. It returns only once the instance accepts
//! connections, or after terminating the partially-started process on
//! failure. Concurrent calls for one project coalesce behind a per-project
//! lock; the losers observe `AlreadyProvisioned`.

mod ports;
mod runner;

pub use ports::PortAllocator;
pub use runner::{InstanceHandle, InstanceRunner, InstanceSpec, PostgresInstanceRunner};

use crate::error::{HarborError, ProvisioningError, Result};
use crate::tenants::{generate_credentials, TenantDirectory};
use dashmap::DashMap;
use harbordb_commons::config::TenantSettings;
use harbordb_commons::{Locator, ProjectId, ProvisioningState, TenantRecord};
use log::{debug, error, info};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a provisioning call. Callers pattern-match instead of catching
/// "already exists" errors.
#[derive(Debug)]
pub enum ProvisionOutcome {
    /// A new instance was started and passed its health check.
    Provisioned(TenantRecord),
    /// A ready instance already existed for this project.
    AlreadyProvisioned(TenantRecord),
}

impl ProvisionOutcome {
    /// The tenant record either way.
    pub fn into_record(self) -> TenantRecord {
        match self {
            ProvisionOutcome::Provisioned(r) | ProvisionOutcome::AlreadyProvisioned(r) => r,
        }
    }
}

/// Tracks live instance processes so shutdown leaves no orphans.
#[derive(Default)]
pub struct InstanceRegistry {
    handles: Mutex<HashMap<ProjectId, InstanceHandle>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, project: ProjectId, handle: InstanceHandle) {
        self.handles.lock().await.insert(project, handle);
    }

    pub async fn take(&self, project: &ProjectId) -> Option<InstanceHandle> {
        self.handles.lock().await.remove(project)
    }

    pub async fn drain(&self) -> Vec<InstanceHandle> {
        self.handles.lock().await.drain().map(|(_, h)| h).collect()
    }

    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }
}

/// Starts, health-checks, and stops tenant database instances.
pub struct Provisioner {
    directory: Arc<dyn TenantDirectory>,
    runner: Arc<dyn InstanceRunner>,
    ports: PortAllocator,
    instances: InstanceRegistry,
    settings: TenantSettings,
    locks: DashMap<ProjectId, Arc<Mutex<()>>>,
}

impl Provisioner {
    pub fn new(
        directory: Arc<dyn TenantDirectory>,
        runner: Arc<dyn InstanceRunner>,
        settings: TenantSettings,
    ) -> Self {
        Self {
            directory,
            runner,
            ports: PortAllocator::new(),
            instances: InstanceRegistry::new(),
            settings,
            locks: DashMap::new(),
        }
    }

    fn project_lock(&self, project: &ProjectId) -> Arc<Mutex<()>> {
        self.locks
            .entry(project.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Provision an instance for `project`, or report the one already running.
    pub async fn provision(&self, project: &ProjectId) -> Result<ProvisionOutcome> {
        let lock = self.project_lock(project);
        let _guard = lock.lock().await;

        if let Some(record) = self.directory.get_tenant_record(project).await? {
            if record.state == ProvisioningState::Ready {
                return Ok(ProvisionOutcome::AlreadyProvisioned(record));
            }
            // Starting or Failed under the lock means the previous attempt
            // died mid-flight; redo it.
            debug!(
                "Re-provisioning project '{}' from state {}",
                project, record.state
            );
        }

        let port = self
            .ports
            .allocate(&self.settings.bind_host, self.settings.port_attempts)
            .map_err(|e| HarborError::provisioning(project.clone(), e))?;

        let spec = InstanceSpec {
            data_dir: Path::new(&self.settings.data_root).join(project.as_str()),
            locator: Locator::new(self.settings.bind_host.clone(), port),
            db_name: self.settings.db_name.clone(),
            credentials: generate_credentials(&self.settings.superuser),
        };

        let mut record = TenantRecord {
            project_id: project.clone(),
            locator: spec.locator.clone(),
            db_name: spec.db_name.clone(),
            credentials: spec.credentials.clone(),
            state: ProvisioningState::Starting,
        };
        self.directory.put_tenant_record(record.clone()).await?;

        match self.start_and_wait(project, &spec).await {
            Ok(handle) => {
                self.instances.register(project.clone(), handle).await;
                self.directory
                    .update_tenant_state(project, ProvisioningState::Ready)
                    .await?;
                record.state = ProvisioningState::Ready;
                info!("Project '{}' provisioned on {}", project, record.locator);
                Ok(ProvisionOutcome::Provisioned(record))
            }
            Err(e) => {
                self.ports.release(port);
                self.directory
                    .update_tenant_state(project, ProvisioningState::Failed)
                    .await?;
                error!("Provisioning failed for project '{}': {}", project, e);
                Err(HarborError::provisioning(project.clone(), e))
            }
        }
    }

    /// Resolve a ready tenant record, provisioning first when needed.
    pub async fn ensure_ready(&self, project: &ProjectId) -> Result<TenantRecord> {
        if let Some(record) = self.directory.get_tenant_record(project).await? {
            if record.is_ready() {
                return Ok(record);
            }
        }
        Ok(self.provision(project).await?.into_record())
    }

    /// Current provisioning state, if the project is known.
    pub async fn status(&self, project: &ProjectId) -> Result<Option<ProvisioningState>> {
        Ok(self
            .directory
            .get_tenant_record(project)
            .await?
            .map(|r| r.state))
    }

    /// Mark a tenant's instance as failed so the next use re-provisions.
    ///
    /// Called when every connection to the instance reports it unreachable.
    /// Stops whatever is left of the process and flips the stored state; the
    /// locator and credentials stay so operators can inspect them.
    pub async fn mark_failed(&self, project: &ProjectId) -> Result<()> {
        let lock = self.project_lock(project);
        let _guard = lock.lock().await;

        if let Some(mut handle) = self.instances.take(project).await {
            let _ = self.runner.stop(&mut handle).await;
            self.ports.release(handle.port);
        }
        match self
            .directory
            .update_tenant_state(project, ProvisioningState::Failed)
            .await
        {
            Ok(()) => Ok(()),
            // Already discarded; nothing to mark.
            Err(HarborError::ProjectNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Stop the instance and discard locator/credentials (project deletion).
    ///
    /// Returns false when the project was unknown.
    pub async fn stop(&self, project: &ProjectId) -> Result<bool> {
        let lock = self.project_lock(project);
        let _guard = lock.lock().await;

        let record = self.directory.get_tenant_record(project).await?;
        if let Some(mut handle) = self.instances.take(project).await {
            self.runner
                .stop(&mut handle)
                .await
                .map_err(|e| HarborError::provisioning(project.clone(), e))?;
            self.ports.release(handle.port);
        }
        self.directory.remove_tenant_record(project).await?;
        Ok(record.is_some())
    }

    /// Stop every live instance (server shutdown).
    pub async fn shutdown_all(&self) {
        for mut handle in self.instances.drain().await {
            let project = handle.project.clone();
            if let Err(e) = self.runner.stop(&mut handle).await {
                error!("Failed to stop instance for project '{}': {}", project, e);
            }
            self.ports.release(handle.port);
        }
    }

    /// Spawn the process, then poll until it answers or attempts run out.
    /// On exhaustion the partially-started process is terminated, never
    /// left running unreferenced.
    async fn start_and_wait(
        &self,
        project: &ProjectId,
        spec: &InstanceSpec,
    ) -> std::result::Result<InstanceHandle, ProvisioningError> {
        let mut handle = self.runner.start(project, spec).await?;

        let mut delay = self.settings.health_backoff();
        let cap = self.settings.health_backoff_cap();
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.settings.health_attempts {
            match self.runner.probe(spec).await {
                Ok(()) => {
                    debug!(
                        "Project '{}' became reachable on attempt {}",
                        project, attempt
                    );
                    if let Err(e) = self.runner.bootstrap(spec).await {
                        let _ = self.runner.stop(&mut handle).await;
                        return Err(e);
                    }
                    return Ok(handle);
                }
                Err(e) => {
                    last_error = e.to_string();
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, cap);
                }
            }
        }

        let _ = self.runner.stop(&mut handle).await;
        Err(ProvisioningError::NeverReachable {
            attempts: self.settings.health_attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenants::InMemoryTenantDirectory;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted runner: fails the first `probe_failures` probes, counts calls.
    struct FakeRunner {
        starts: AtomicU32,
        probes: AtomicU32,
        stops: AtomicU32,
        probe_failures: u32,
    }

    impl FakeRunner {
        fn new(probe_failures: u32) -> Self {
            Self {
                starts: AtomicU32::new(0),
                probes: AtomicU32::new(0),
                stops: AtomicU32::new(0),
                probe_failures,
            }
        }
    }

    #[async_trait]
    impl InstanceRunner for FakeRunner {
        async fn start(
            &self,
            project: &ProjectId,
            spec: &InstanceSpec,
        ) -> std::result::Result<InstanceHandle, ProvisioningError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(InstanceHandle::new(
                project.clone(),
                spec.locator.port,
                None,
            ))
        }

        async fn probe(&self, _spec: &InstanceSpec) -> std::result::Result<(), ProvisioningError> {
            let n = self.probes.fetch_add(1, Ordering::SeqCst);
            if n < self.probe_failures {
                Err(ProvisioningError::Stopped("connection refused".into()))
            } else {
                Ok(())
            }
        }

        async fn bootstrap(
            &self,
            _spec: &InstanceSpec,
        ) -> std::result::Result<(), ProvisioningError> {
            Ok(())
        }

        async fn stop(
            &self,
            _handle: &mut InstanceHandle,
        ) -> std::result::Result<(), ProvisioningError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast_settings() -> TenantSettings {
        TenantSettings {
            health_attempts: 3,
            health_backoff_ms: 1,
            health_backoff_cap_ms: 2,
            ..TenantSettings::default()
        }
    }

    fn provisioner(runner: Arc<FakeRunner>) -> Provisioner {
        Provisioner::new(
            Arc::new(InMemoryTenantDirectory::new()),
            runner,
            fast_settings(),
        )
    }

    #[tokio::test]
    async fn test_provision_succeeds_after_transient_probe_failures() {
        let runner = Arc::new(FakeRunner::new(2));
        let p = provisioner(Arc::clone(&runner));
        let project = ProjectId::new("p1");

        let outcome = p.provision(&project).await.unwrap();
        assert!(matches!(outcome, ProvisionOutcome::Provisioned(_)));
        assert_eq!(runner.starts.load(Ordering::SeqCst), 1);
        assert_eq!(runner.probes.load(Ordering::SeqCst), 3);
        assert_eq!(p.status(&project).await.unwrap(), Some(ProvisioningState::Ready));
        assert_eq!(p.instances.len().await, 1);
    }

    #[tokio::test]
    async fn test_provision_kills_instance_when_never_reachable() {
        let runner = Arc::new(FakeRunner::new(u32::MAX));
        let p = provisioner(Arc::clone(&runner));
        let project = ProjectId::new("p1");

        let err = p.provision(&project).await.unwrap_err();
        assert!(matches!(err, HarborError::Provisioning { .. }));
        // The partially-started process was terminated, not orphaned.
        assert_eq!(runner.stops.load(Ordering::SeqCst), 1);
        assert_eq!(p.instances.len().await, 0);
        assert_eq!(
            p.status(&project).await.unwrap(),
            Some(ProvisioningState::Failed)
        );
        // The reserved port was returned for reuse.
        assert_eq!(p.ports.reserved_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_provisions_coalesce() {
        let runner = Arc::new(FakeRunner::new(0));
        let p = Arc::new(provisioner(Arc::clone(&runner)));
        let project = ProjectId::new("p1");

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&p);
                let project = project.clone();
                tokio::spawn(async move { p.provision(&project).await.unwrap() })
            })
            .collect();

        let mut provisioned = 0;
        let mut already = 0;
        for task in tasks {
            match task.await.unwrap() {
                ProvisionOutcome::Provisioned(_) => provisioned += 1,
                ProvisionOutcome::AlreadyProvisioned(_) => already += 1,
            }
        }

        assert_eq!(provisioned, 1);
        assert_eq!(already, 3);
        assert_eq!(runner.starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_provision_is_retryable() {
        let runner = Arc::new(FakeRunner::new(3));
        let p = provisioner(Arc::clone(&runner));
        let project = ProjectId::new("p1");

        // 3 failures exhaust the 3 attempts of the first call.
        assert!(p.provision(&project).await.is_err());
        // The next call starts a fresh instance and succeeds.
        let outcome = p.provision(&project).await.unwrap();
        assert!(matches!(outcome, ProvisionOutcome::Provisioned(_)));
        assert_eq!(runner.starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stop_discards_record_and_instance() {
        let runner = Arc::new(FakeRunner::new(0));
        let p = provisioner(Arc::clone(&runner));
        let project = ProjectId::new("p1");

        p.provision(&project).await.unwrap();
        assert!(p.stop(&project).await.unwrap());
        assert_eq!(runner.stops.load(Ordering::SeqCst), 1);
        assert_eq!(p.status(&project).await.unwrap(), None);
        assert_eq!(p.ports.reserved_count(), 0);

        // Stopping an unknown project reports false, not an error.
        assert!(!p.stop(&project).await.unwrap());
    }
}
