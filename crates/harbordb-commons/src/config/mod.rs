//! Server configuration types and loader.

pub mod defaults;
mod loader;
mod types;

pub use types::{
    CacheSettings, LoggingSettings, PoolSettings, QuerySettings, ServerConfig, ServerSettings,
    TenantSettings,
};
