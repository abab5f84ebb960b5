//! # harbordb-api
//!
//! HTTP surface for HarborDB. Thin by design: handlers parse and validate at
//! the boundary, call into `harbordb-core`, and map errors to typed
//! responses. Validation and execution errors surface the underlying message
//! verbatim; infrastructure errors return a generic service-unavailable
//! payload plus a correlation id for operator diagnosis.

pub mod handlers;
pub mod models;
pub mod routes;
