// Default value functions

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_workers() -> usize {
    0 // 0 = one worker per core (actix default)
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "compact".to_string()
}

pub fn default_logs_path() -> String {
    "./logs".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_data_root() -> String {
    "./data/tenants".to_string()
}

pub fn default_db_name() -> String {
    "app".to_string()
}

pub fn default_superuser() -> String {
    "harbor_admin".to_string()
}

pub fn default_initdb_path() -> String {
    "initdb".to_string()
}

pub fn default_postgres_path() -> String {
    "postgres".to_string()
}

pub fn default_port_attempts() -> u32 {
    16
}

pub fn default_health_attempts() -> u32 {
    30
}

pub fn default_health_backoff_ms() -> u64 {
    250
}

pub fn default_health_backoff_cap_ms() -> u64 {
    2000
}

pub fn default_pool_max_size() -> usize {
    8
}

pub fn default_pool_idle_secs() -> u64 {
    900 // 15 minutes
}

pub fn default_acquire_retries() -> u32 {
    2
}

pub fn default_acquire_backoff_ms() -> u64 {
    100
}

pub fn default_query_limit() -> u64 {
    50
}

pub fn default_max_query_limit() -> u64 {
    1000
}

pub fn default_query_timeout_ms() -> u64 {
    10_000
}

pub fn default_degraded_after_timeouts() -> u32 {
    3
}

pub fn default_cache_max_entries() -> u64 {
    10_000
}

pub fn default_cache_tti_secs() -> u64 {
    300
}
