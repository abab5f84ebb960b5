//! Tag-based cache invalidation.
//!
//! Reads register under deterministic cache tags; mutation paths invalidate
//! exactly the tags they affect through one explicit mapping. Stale reads
//! after a write are the correctness risk here — over-invalidation only
//! costs a recompute.

mod coordinator;
mod tag_cache;
mod tags;

pub use coordinator::{InvalidationCoordinator, Mutation};
pub use tag_cache::TaggedCache;
pub use tags::{CacheTag, TagKind};
