//! Tenant pool registry.
//!
//! Process-wide cache mapping a tenant key (locator + credential
//! fingerprint) to a live connection pool. Pools are created lazily on first
//! use, reused thereafter, and owned exclusively by the registry — callers
//! borrow. The registry is the single writer of pool-lifecycle state.

use super::key::PoolKey;
use crate::error::{HarborError, Result};
use crate::provision::Provisioner;
use dashmap::DashMap;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolError, RecyclingMethod, Runtime};
use harbordb_commons::config::PoolSettings;
use harbordb_commons::{ProjectId, TenantRecord};
use log::{debug, info, warn};
use parking_lot::Mutex as SyncMutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_postgres::NoTls;

/// Builds a pool for one tenant record. Behind a trait so registry tests can
/// count constructions without a live database.
pub trait PoolFactory: Send + Sync {
    fn build(&self, record: &TenantRecord, settings: &PoolSettings) -> Result<Pool>;
}

/// Production factory: deadpool-postgres over tokio-postgres, no TLS —
/// tenant instances only listen on loopback.
pub struct DeadpoolFactory;

impl PoolFactory for DeadpoolFactory {
    fn build(&self, record: &TenantRecord, settings: &PoolSettings) -> Result<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(record.locator.host.clone());
        cfg.port = Some(record.locator.port);
        cfg.dbname = Some(record.db_name.clone());
        cfg.user = Some(record.credentials.user.clone());
        cfg.password = Some(record.credentials.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(deadpool_postgres::PoolConfig::new(settings.max_size));

        cfg.create_pool(Some(Runtime::Tokio1), NoTls).map_err(|e| {
            HarborError::pool_acquisition(
                record.project_id.clone(),
                format!("Failed to create pool: {}", e),
            )
        })
    }
}

struct PoolEntry {
    pool: Arc<Pool>,
    last_used: SyncMutex<Instant>,
}

impl PoolEntry {
    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> std::time::Duration {
        self.last_used.lock().elapsed()
    }
}

/// Registry of live tenant pools.
pub struct PoolRegistry {
    provisioner: Arc<Provisioner>,
    factory: Arc<dyn PoolFactory>,
    settings: PoolSettings,
    pools: DashMap<PoolKey, PoolEntry>,
    creation_locks: DashMap<PoolKey, Arc<Mutex<()>>>,
}

impl PoolRegistry {
    pub fn new(
        provisioner: Arc<Provisioner>,
        factory: Arc<dyn PoolFactory>,
        settings: PoolSettings,
    ) -> Self {
        Self {
            provisioner,
            factory,
            settings,
            pools: DashMap::new(),
            creation_locks: DashMap::new(),
        }
    }

    /// Borrow the pool for a project, resolving (and provisioning, when the
    /// project has never been started) on first use.
    ///
    /// Concurrent first-uses of one key coalesce: the per-key creation lock
    /// plus a double-checked lookup guarantee exactly one construction,
    /// without serializing unrelated tenants.
    pub async fn get_pool(&self, project: &ProjectId) -> Result<Arc<Pool>> {
        let record = self.provisioner.ensure_ready(project).await?;
        let key = PoolKey::for_record(&record);

        if let Some(entry) = self.pools.get(&key) {
            entry.touch();
            return Ok(Arc::clone(&entry.pool));
        }

        let lock = self
            .creation_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = lock.lock().await;

        // Double-checked: a concurrent caller may have built it while we
        // waited on the lock.
        if let Some(entry) = self.pools.get(&key) {
            entry.touch();
            return Ok(Arc::clone(&entry.pool));
        }

        let pool = Arc::new(self.factory.build(&record, &self.settings)?);
        self.pools.insert(
            key,
            PoolEntry {
                pool: Arc::clone(&pool),
                last_used: SyncMutex::new(Instant::now()),
            },
        );
        info!(
            "Created pool for project '{}' at {} (max {})",
            project, record.locator, self.settings.max_size
        );
        Ok(pool)
    }

    /// Check a connection out of the project's pool, with bounded retries
    /// and backoff on transient acquisition failure (exhaustion, a briefly
    /// unreachable instance).
    ///
    /// When every attempt fails at the connection level the instance itself
    /// is unreachable: the pool is removed and the tenant marked failed, so
    /// the next `get_pool` re-provisions instead of reusing a dead locator.
    pub async fn acquire(&self, project: &ProjectId) -> Result<deadpool_postgres::Object> {
        let pool = self.get_pool(project).await?;
        let mut delay = self.settings.acquire_backoff();
        let mut last_error = String::new();
        let mut unreachable = true;

        for attempt in 0..=self.settings.acquire_retries {
            match pool.get().await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    unreachable &= matches!(e, PoolError::Backend(_));
                    last_error = e.to_string();
                    if attempt < self.settings.acquire_retries {
                        debug!(
                            "Pool acquisition retry {} for project '{}': {}",
                            attempt + 1,
                            project,
                            last_error
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        if unreachable {
            warn!(
                "Project '{}' instance unreachable; scheduling re-provision",
                project
            );
            self.mark_broken(project);
            if let Err(e) = self.provisioner.mark_failed(project).await {
                warn!("Failed to mark project '{}' as failed: {}", project, e);
            }
        }

        Err(HarborError::pool_acquisition(project.clone(), last_error))
    }

    /// Remove every pool for a project (unreachable instance, credential
    /// rotation cleanup, repeated timeouts). The next `get_pool`
    /// re-resolves and re-provisions as needed.
    pub fn mark_broken(&self, project: &ProjectId) {
        let keys: Vec<PoolKey> = self
            .pools
            .iter()
            .filter(|e| &e.key().project == project)
            .map(|e| e.key().clone())
            .collect();
        for key in keys {
            if let Some((_, entry)) = self.pools.remove(&key) {
                entry.pool.close();
                warn!("Removed degraded pool for project '{}'", project);
            }
            self.creation_locks.remove(&key);
        }
    }

    /// Close and remove pools idle past the configured window.
    /// Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let window = self.settings.idle_window();
        let idle: Vec<PoolKey> = self
            .pools
            .iter()
            .filter(|e| e.value().idle_for() > window)
            .map(|e| e.key().clone())
            .collect();

        let mut evicted = 0;
        for key in idle {
            if let Some((_, entry)) = self.pools.remove(&key) {
                entry.pool.close();
                evicted += 1;
                debug!("Evicted idle pool for project '{}'", key.project);
            }
            self.creation_locks.remove(&key);
        }
        evicted
    }

    /// Close every pool (server shutdown).
    pub fn shutdown(&self) {
        for entry in self.pools.iter() {
            entry.value().pool.close();
        }
        self.pools.clear();
        self.creation_locks.clear();
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::{InstanceHandle, InstanceRunner, InstanceSpec};
    use crate::tenants::InMemoryTenantDirectory;
    use async_trait::async_trait;
    use harbordb_commons::config::TenantSettings;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AlwaysUpRunner {
        starts: AtomicU32,
    }

    #[async_trait]
    impl InstanceRunner for AlwaysUpRunner {
        async fn start(
            &self,
            project: &ProjectId,
            spec: &InstanceSpec,
        ) -> std::result::Result<InstanceHandle, crate::error::ProvisioningError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(InstanceHandle::new(
                project.clone(),
                spec.locator.port,
                None,
            ))
        }

        async fn probe(
            &self,
            _spec: &InstanceSpec,
        ) -> std::result::Result<(), crate::error::ProvisioningError> {
            Ok(())
        }

        async fn bootstrap(
            &self,
            _spec: &InstanceSpec,
        ) -> std::result::Result<(), crate::error::ProvisioningError> {
            Ok(())
        }

        async fn stop(
            &self,
            _handle: &mut InstanceHandle,
        ) -> std::result::Result<(), crate::error::ProvisioningError> {
            Ok(())
        }
    }

    struct CountingFactory {
        builds: AtomicU32,
    }

    impl PoolFactory for CountingFactory {
        fn build(&self, record: &TenantRecord, settings: &PoolSettings) -> Result<Pool> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            // Building a deadpool pool opens no connections; a real pool
            // against the record's locator is safe without a server.
            DeadpoolFactory.build(record, settings)
        }
    }

    struct Fixture {
        registry: Arc<PoolRegistry>,
        factory: Arc<CountingFactory>,
        runner: Arc<AlwaysUpRunner>,
        directory: Arc<InMemoryTenantDirectory>,
    }

    fn fixture(idle_secs: u64) -> Fixture {
        let runner = Arc::new(AlwaysUpRunner {
            starts: AtomicU32::new(0),
        });
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let provisioner = Arc::new(Provisioner::new(
            Arc::clone(&directory) as Arc<dyn crate::tenants::TenantDirectory>,
            Arc::clone(&runner) as Arc<dyn InstanceRunner>,
            TenantSettings {
                health_backoff_ms: 1,
                health_backoff_cap_ms: 1,
                ..TenantSettings::default()
            },
        ));
        let factory = Arc::new(CountingFactory {
            builds: AtomicU32::new(0),
        });
        let registry = Arc::new(PoolRegistry::new(
            provisioner,
            Arc::clone(&factory) as Arc<dyn PoolFactory>,
            PoolSettings {
                idle_secs,
                acquire_retries: 1,
                acquire_backoff_ms: 1,
                ..PoolSettings::default()
            },
        ));
        Fixture {
            registry,
            factory,
            runner,
            directory,
        }
    }

    fn registry(idle_secs: u64) -> (Arc<PoolRegistry>, Arc<CountingFactory>, Arc<AlwaysUpRunner>) {
        let f = fixture(idle_secs);
        (f.registry, f.factory, f.runner)
    }

    #[tokio::test]
    async fn test_hit_returns_same_pool_without_rebuild() {
        let (registry, factory, _) = registry(900);
        let project = ProjectId::new("p1");

        let a = registry.get_pool(&project).await.unwrap();
        let b = registry.get_pool(&project).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_one_pool_one_instance() {
        let (registry, factory, runner) = registry(900);
        let project = ProjectId::new("p1");

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let project = project.clone();
                tokio::spawn(async move { registry.get_pool(&project).await.unwrap() })
            })
            .collect();

        let mut pools = Vec::new();
        for task in tasks {
            pools.push(task.await.unwrap());
        }

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
        assert_eq!(runner.starts.load(Ordering::SeqCst), 1);
        for pool in &pools[1..] {
            assert!(Arc::ptr_eq(&pools[0], pool));
        }
    }

    #[tokio::test]
    async fn test_distinct_tenants_get_distinct_pools() {
        let (registry, factory, _) = registry(900);

        let a = registry.get_pool(&ProjectId::new("p1")).await.unwrap();
        let b = registry.get_pool(&ProjectId::new("p2")).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_mark_broken_forces_rebuild() {
        let (registry, factory, _) = registry(900);
        let project = ProjectId::new("p1");

        registry.get_pool(&project).await.unwrap();
        registry.mark_broken(&project);
        assert_eq!(registry.pool_count(), 0);

        registry.get_pool(&project).await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_instance_forces_reprovision() {
        use crate::tenants::TenantDirectory;
        use harbordb_commons::ProvisioningState;

        let f = fixture(900);
        let project = ProjectId::new("p1");

        // No server listens on the allocated port, so every checkout fails
        // at the connection level.
        let err = f.registry.acquire(&project).await.unwrap_err();
        assert!(matches!(err, HarborError::PoolAcquisition { .. }));

        // The dead pool is gone and the tenant is marked failed...
        assert_eq!(f.registry.pool_count(), 0);
        let record = f
            .directory
            .get_tenant_record(&project)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.state, ProvisioningState::Failed);

        // ...so the next use starts a fresh instance.
        f.registry.get_pool(&project).await.unwrap();
        assert_eq!(f.runner.starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_evict_idle_removes_stale_pools() {
        let (registry, _, _) = registry(0);
        let project = ProjectId::new("p1");

        registry.get_pool(&project).await.unwrap();
        assert_eq!(registry.pool_count(), 1);

        // idle_secs = 0: anything not touched this instant is evictable.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(registry.evict_idle(), 1);
        assert_eq!(registry.pool_count(), 0);
    }
}
