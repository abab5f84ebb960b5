//! Instance runner: the process-level mechanics of starting, probing, and
//! stopping one tenant's PostgreSQL server.
//!
//! The provisioner drives retry, backoff, and state transitions through the
//! [`InstanceRunner`] trait; [`PostgresInstanceRunner`] is the production
//! implementation shelling out to the PostgreSQL binaries.

use crate::error::ProvisioningError;
use async_trait::async_trait;
use harbordb_commons::config::TenantSettings;
use harbordb_commons::{Credentials, Locator, ProjectId};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio_postgres::NoTls;

/// Everything the runner needs to start one instance.
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    pub data_dir: PathBuf,
    pub locator: Locator,
    /// Application database created inside the instance.
    pub db_name: String,
    pub credentials: Credentials,
}

/// A started (possibly not yet healthy) instance.
///
/// Holds the child process so the platform can terminate it; a handle without
/// a child belongs to a scripted test runner.
pub struct InstanceHandle {
    pub project: ProjectId,
    pub port: u16,
    child: Option<Child>,
}

impl InstanceHandle {
    pub fn new(project: ProjectId, port: u16, child: Option<Child>) -> Self {
        Self {
            project,
            port,
            child,
        }
    }

    /// OS pid, when a real process backs this handle.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    async fn kill(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.kill().await {
                warn!(
                    "Failed to kill instance process for project '{}': {}",
                    self.project, e
                );
            }
            // Reap so the pid does not linger as a zombie.
            let _ = child.wait().await;
        }
        self.child = None;
    }
}

/// Process-level operations on one tenant instance.
#[async_trait]
pub trait InstanceRunner: Send + Sync {
    /// Initialize the data directory if needed and spawn the server process.
    async fn start(
        &self,
        project: &ProjectId,
        spec: &InstanceSpec,
    ) -> Result<InstanceHandle, ProvisioningError>;

    /// One authenticated connection attempt against the instance.
    async fn probe(&self, spec: &InstanceSpec) -> Result<(), ProvisioningError>;

    /// Create the application database once the instance answers.
    async fn bootstrap(&self, spec: &InstanceSpec) -> Result<(), ProvisioningError>;

    /// Terminate the instance process and reap it.
    async fn stop(&self, handle: &mut InstanceHandle) -> Result<(), ProvisioningError>;
}

/// Runs real PostgreSQL instances via `initdb` and `postgres`.
pub struct PostgresInstanceRunner {
    settings: TenantSettings,
}

impl PostgresInstanceRunner {
    pub fn new(settings: TenantSettings) -> Self {
        Self { settings }
    }

    /// `initdb` refuses to run twice; the version file marks a finished init.
    fn is_initialized(data_dir: &PathBuf) -> bool {
        data_dir.join("PG_VERSION").exists()
    }

    async fn run_initdb(&self, spec: &InstanceSpec) -> Result<(), ProvisioningError> {
        tokio::fs::create_dir_all(&spec.data_dir).await?;

        // initdb reads the superuser password from a file so it never shows
        // up in the process list.
        let pwfile = spec.data_dir.with_extension("pwfile");
        tokio::fs::write(&pwfile, format!("{}\n", spec.credentials.password)).await?;

        let output = Command::new(&self.settings.initdb_path)
            .arg("-D")
            .arg(&spec.data_dir)
            .arg("-U")
            .arg(&spec.credentials.user)
            .arg("--auth=scram-sha-256")
            .arg(format!("--pwfile={}", pwfile.display()))
            .arg("-E")
            .arg("UTF8")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ProvisioningError::InitFailed(e.to_string()))?;

        let _ = tokio::fs::remove_file(&pwfile).await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProvisioningError::InitFailed(stderr.trim().to_string()));
        }

        debug!("initdb completed for {}", spec.data_dir.display());
        Ok(())
    }

    fn probe_config(spec: &InstanceSpec, db_name: &str) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&spec.locator.host)
            .port(spec.locator.port)
            .user(&spec.credentials.user)
            .password(&spec.credentials.password)
            .dbname(db_name)
            .connect_timeout(Duration::from_secs(3));
        config
    }
}

#[async_trait]
impl InstanceRunner for PostgresInstanceRunner {
    async fn start(
        &self,
        project: &ProjectId,
        spec: &InstanceSpec,
    ) -> Result<InstanceHandle, ProvisioningError> {
        if !Self::is_initialized(&spec.data_dir) {
            self.run_initdb(spec).await?;
        }

        let log_path = spec.data_dir.join("postmaster.log");
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        // Unix sockets go inside the data directory so concurrent instances
        // never fight over /tmp lock files.
        let child = Command::new(&self.settings.postgres_path)
            .arg("-D")
            .arg(&spec.data_dir)
            .arg("-p")
            .arg(spec.locator.port.to_string())
            .arg("-c")
            .arg(format!("listen_addresses={}", spec.locator.host))
            .arg("-c")
            .arg(format!(
                "unix_socket_directories={}",
                spec.data_dir.display()
            ))
            .stdout(Stdio::null())
            .stderr(Stdio::from(log_file))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProvisioningError::SpawnFailed(e.to_string()))?;

        info!(
            "Started instance for project '{}' on {} (pid {:?})",
            project,
            spec.locator,
            child.id()
        );

        Ok(InstanceHandle::new(
            project.clone(),
            spec.locator.port,
            Some(child),
        ))
    }

    async fn probe(&self, spec: &InstanceSpec) -> Result<(), ProvisioningError> {
        // Probe against the maintenance database; the application database
        // does not exist until bootstrap.
        let config = Self::probe_config(spec, "postgres");
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| ProvisioningError::Stopped(e.to_string()))?;
        let driver = tokio::spawn(connection);

        let result = client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| ProvisioningError::Stopped(e.to_string()));

        drop(client);
        let _ = driver.await;
        result
    }

    async fn bootstrap(&self, spec: &InstanceSpec) -> Result<(), ProvisioningError> {
        let config = Self::probe_config(spec, "postgres");
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| ProvisioningError::Stopped(e.to_string()))?;
        let driver = tokio::spawn(connection);

        let result = async {
            let existing = client
                .query("SELECT 1 FROM pg_database WHERE datname = $1", &[&spec.db_name])
                .await
                .map_err(|e| ProvisioningError::Stopped(e.to_string()))?;

            if existing.is_empty() {
                // CREATE DATABASE cannot take a bind parameter; the name comes
                // from server config, not user input, and is quote-escaped.
                let statement =
                    format!("CREATE DATABASE \"{}\"", spec.db_name.replace('"', "\"\""));
                client
                    .batch_execute(&statement)
                    .await
                    .map_err(|e| ProvisioningError::Stopped(e.to_string()))?;
                debug!("Created application database '{}'", spec.db_name);
            }
            Ok(())
        }
        .await;

        drop(client);
        let _ = driver.await;
        result
    }

    async fn stop(&self, handle: &mut InstanceHandle) -> Result<(), ProvisioningError> {
        handle.kill().await;
        info!("Stopped instance for project '{}'", handle.project);
        Ok(())
    }
}
