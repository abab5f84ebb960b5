//! # harbordb-core
//!
//! The engineering core of HarborDB:
//!
//! - **tenants** — the credential & locator store boundary
//!   ([`tenants::TenantDirectory`]) and its in-memory implementation
//! - **provision** — per-project database instance lifecycle: port
//!   allocation, process start, health polling, teardown
//! - **pools** — the tenant pool registry multiplexing requests onto
//!   per-tenant credentials without duplicating pools
//! - **query** — descriptor validation, SQL construction, column-oriented
//!   result pages, free-form SQL execution
//! - **cache** — tag derivation and invalidation keeping cached reads
//!   consistent with writes
//!
//! [`app_context::AppContext`] wires the pieces together per process.

pub mod app_context;
pub mod cache;
pub mod error;
pub mod pools;
pub mod provision;
pub mod query;
pub mod tenants;

pub use app_context::AppContext;
pub use error::{HarborError, ProvisioningError, Result, ValidationError};
