//! Tenant connection pools.

mod key;
mod registry;

pub use key::PoolKey;
pub use registry::{DeadpoolFactory, PoolFactory, PoolRegistry};
