//! # harbordb-commons
//!
//! Shared types and configuration for HarborDB.
//!
//! This crate provides the foundational types used across all HarborDB crates
//! (harbordb-core, harbordb-api, the server binary). It stays dependency-light
//! to prevent circular dependency issues.
//!
//! ## Type-Safe Wrappers
//!
//! - `ProjectId`: project (tenant) identifier wrapper
//! - `TableRef`: composite of schema name + table name
//! - `TenantRecord`: locator, credentials, and provisioning state for one tenant

pub mod config;
pub mod errors;
pub mod ids;
pub mod models;

pub use config::ServerConfig;
pub use errors::{CommonError, Result};
pub use ids::{ProjectId, TableRef};
pub use models::{Credentials, Locator, ProvisioningState, TenantRecord};
