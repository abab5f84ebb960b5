use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub tenants: TenantSettings,
    #[serde(default)]
    pub pools: PoolSettings,
    #[serde(default)]
    pub query: QuerySettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            logging: LoggingSettings::default(),
            tenants: TenantSettings::default(),
            pools: PoolSettings::default(),
            query: QuerySettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of HTTP worker threads. 0 = one per core.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Base level: error | warn | info | debug | trace
    #[serde(default = "default_log_level")]
    pub level: String,

    /// File log format: compact | json
    #[serde(default = "default_log_format")]
    pub format: String,

    #[serde(default = "default_logs_path")]
    pub logs_path: String,

    #[serde(default = "default_true")]
    pub log_to_console: bool,

    /// Per-target level overrides, e.g. `{"harbordb_core::provision" = "debug"}`
    #[serde(default)]
    pub targets: HashMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            logs_path: default_logs_path(),
            log_to_console: default_true(),
            targets: HashMap::new(),
        }
    }
}

/// Tenant instance provisioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    /// Root directory holding one private data directory per project.
    #[serde(default = "default_data_root")]
    pub data_root: String,

    /// Address tenant instances bind to. Tenants are never exposed publicly.
    #[serde(default = "default_host")]
    pub bind_host: String,

    /// Database created for application access inside each instance.
    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Superuser name passed to initdb.
    #[serde(default = "default_superuser")]
    pub superuser: String,

    /// Path to the initdb binary.
    #[serde(default = "default_initdb_path")]
    pub initdb_path: String,

    /// Path to the postgres server binary.
    #[serde(default = "default_postgres_path")]
    pub postgres_path: String,

    /// Bounded attempts at allocating a collision-free port.
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u32,

    /// Bounded attempts at observing a successful authenticated connection.
    #[serde(default = "default_health_attempts")]
    pub health_attempts: u32,

    /// Initial delay between health-check attempts; doubles up to the cap.
    #[serde(default = "default_health_backoff_ms")]
    pub health_backoff_ms: u64,

    #[serde(default = "default_health_backoff_cap_ms")]
    pub health_backoff_cap_ms: u64,
}

impl TenantSettings {
    pub fn health_backoff(&self) -> Duration {
        Duration::from_millis(self.health_backoff_ms)
    }

    pub fn health_backoff_cap(&self) -> Duration {
        Duration::from_millis(self.health_backoff_cap_ms)
    }
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            bind_host: default_host(),
            db_name: default_db_name(),
            superuser: default_superuser(),
            initdb_path: default_initdb_path(),
            postgres_path: default_postgres_path(),
            port_attempts: default_port_attempts(),
            health_attempts: default_health_attempts(),
            health_backoff_ms: default_health_backoff_ms(),
            health_backoff_cap_ms: default_health_backoff_cap_ms(),
        }
    }
}

/// Per-tenant connection pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum connections per tenant pool.
    #[serde(default = "default_pool_max_size")]
    pub max_size: usize,

    /// Pools unused for this long are closed and removed.
    #[serde(default = "default_pool_idle_secs")]
    pub idle_secs: u64,

    /// Bounded retries when acquisition hits a transient failure.
    #[serde(default = "default_acquire_retries")]
    pub acquire_retries: u32,

    #[serde(default = "default_acquire_backoff_ms")]
    pub acquire_backoff_ms: u64,
}

impl PoolSettings {
    pub fn idle_window(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    pub fn acquire_backoff(&self) -> Duration {
        Duration::from_millis(self.acquire_backoff_ms)
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: default_pool_max_size(),
            idle_secs: default_pool_idle_secs(),
            acquire_retries: default_acquire_retries(),
            acquire_backoff_ms: default_acquire_backoff_ms(),
        }
    }
}

/// Query engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySettings {
    /// Page size applied when a request omits `limit`.
    #[serde(default = "default_query_limit")]
    pub default_limit: u64,

    /// Hard ceiling on requested page size.
    #[serde(default = "default_max_query_limit")]
    pub max_limit: u64,

    /// Per-call deadline applied when the request carries none.
    #[serde(default = "default_query_timeout_ms")]
    pub timeout_ms: u64,

    /// Consecutive timeouts against one tenant before its pool is
    /// marked degraded and removed.
    #[serde(default = "default_degraded_after_timeouts")]
    pub degraded_after_timeouts: u32,
}

impl QuerySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_limit: default_query_limit(),
            max_limit: default_max_query_limit(),
            timeout_ms: default_query_timeout_ms(),
            degraded_after_timeouts: default_degraded_after_timeouts(),
        }
    }
}

/// Tagged read-cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: u64,

    /// Time-to-idle for cached reads; staleness is still driven by tag
    /// invalidation, TTI only bounds memory.
    #[serde(default = "default_cache_tti_secs")]
    pub tti_secs: u64,
}

impl CacheSettings {
    pub fn tti(&self) -> Duration {
        Duration::from_secs(self.tti_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            tti_secs: default_cache_tti_secs(),
        }
    }
}
