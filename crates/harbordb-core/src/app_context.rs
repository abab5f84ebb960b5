//! AppContext singleton for HarborDB.
//!
//! Central registry of the shared resources one server process carries:
//! tenant directory, provisioner, pool registry, query engine, invalidation
//! coordinator. Process-scoped state is explicit and lazily initialized with
//! a single-writer installation path — `install` is the only writer,
//! everyone else reads through `get`.

use crate::cache::InvalidationCoordinator;
use crate::pools::{DeadpoolFactory, PoolFactory, PoolRegistry};
use crate::provision::{InstanceRunner, PostgresInstanceRunner, Provisioner};
use crate::query::QueryEngine;
use crate::tenants::{InMemoryTenantDirectory, TenantDirectory};
use harbordb_commons::ServerConfig;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

static APP_CONTEXT: OnceLock<Arc<AppContext>> = OnceLock::new();

/// Shared resources, wired once at startup.
pub struct AppContext {
    config: Arc<ServerConfig>,
    directory: Arc<dyn TenantDirectory>,
    provisioner: Arc<Provisioner>,
    registry: Arc<PoolRegistry>,
    engine: Arc<QueryEngine>,
    coordinator: Arc<InvalidationCoordinator>,
    server_start_time: Instant,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("uptime_secs", &self.uptime_secs())
            .finish()
    }
}

impl AppContext {
    /// Build the production stack: in-memory tenant directory, PostgreSQL
    /// instance runner, deadpool factory.
    pub fn build(config: ServerConfig) -> Arc<AppContext> {
        Self::build_with(
            config,
            Arc::new(InMemoryTenantDirectory::new()),
            None,
            Arc::new(DeadpoolFactory),
        )
    }

    /// Build with explicit collaborators (external metadata store, scripted
    /// runner in tests).
    pub fn build_with(
        config: ServerConfig,
        directory: Arc<dyn TenantDirectory>,
        runner: Option<Arc<dyn InstanceRunner>>,
        factory: Arc<dyn PoolFactory>,
    ) -> Arc<AppContext> {
        let config = Arc::new(config);
        let runner = runner
            .unwrap_or_else(|| Arc::new(PostgresInstanceRunner::new(config.tenants.clone())));

        let provisioner = Arc::new(Provisioner::new(
            Arc::clone(&directory),
            runner,
            config.tenants.clone(),
        ));
        let registry = Arc::new(PoolRegistry::new(
            Arc::clone(&provisioner),
            factory,
            config.pools.clone(),
        ));
        let coordinator = Arc::new(InvalidationCoordinator::new());
        let engine = Arc::new(QueryEngine::new(
            Arc::clone(&registry),
            Arc::clone(&coordinator),
            &config.cache,
            config.query.clone(),
        ));

        Arc::new(AppContext {
            config,
            directory,
            provisioner,
            registry,
            engine,
            coordinator,
            server_start_time: Instant::now(),
        })
    }

    /// Install the process-wide instance. Returns false when one was already
    /// installed (the existing one stays).
    pub fn install(context: Arc<AppContext>) -> bool {
        APP_CONTEXT.set(context).is_ok()
    }

    /// Fetch the process-wide instance.
    ///
    /// Panics when called before `install` — that is a wiring bug, not a
    /// runtime condition.
    pub fn get() -> Arc<AppContext> {
        APP_CONTEXT
            .get()
            .expect("AppContext not initialized")
            .clone()
    }

    pub fn try_get() -> Option<Arc<AppContext>> {
        APP_CONTEXT.get().cloned()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn directory(&self) -> Arc<dyn TenantDirectory> {
        Arc::clone(&self.directory)
    }

    pub fn provisioner(&self) -> Arc<Provisioner> {
        Arc::clone(&self.provisioner)
    }

    pub fn registry(&self) -> Arc<PoolRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn engine(&self) -> Arc<QueryEngine> {
        Arc::clone(&self.engine)
    }

    pub fn coordinator(&self) -> Arc<InvalidationCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.server_start_time.elapsed().as_secs()
    }

    /// Graceful teardown: close pools, stop tenant instances.
    pub async fn shutdown(&self) {
        self.registry.shutdown();
        self.provisioner.shutdown_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_wires_shared_coordinator() {
        let context = AppContext::build(ServerConfig::default());
        // The engine invalidates through the same coordinator the context
        // exposes to mutation paths.
        assert!(Arc::ptr_eq(
            &context.coordinator(),
            &context.engine().coordinator()
        ));
    }
}
