//! Tagged read-through cache.
//!
//! Entries register under a set of cache tags; invalidating any of those tags
//! makes the entry stale, and the next read recomputes and re-registers. The
//! backing store is a bounded moka cache, so entries can also disappear under
//! capacity or idle-time pressure — that only causes extra recomputes, never
//! staleness.

use super::coordinator::InvalidationCoordinator;
use super::tags::CacheTag;
use crate::error::Result;
use harbordb_commons::config::CacheSettings;
use moka::sync::Cache;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone)]
struct TaggedEntry<V> {
    value: V,
    /// Tag epochs observed at registration time.
    stamps: Arc<Vec<(CacheTag, u64)>>,
}

/// A bounded cache whose entries expire via tag invalidation.
pub struct TaggedCache<V: Clone + Send + Sync + 'static> {
    inner: Cache<String, TaggedEntry<V>>,
    coordinator: Arc<InvalidationCoordinator>,
}

impl<V: Clone + Send + Sync + 'static> TaggedCache<V> {
    pub fn new(settings: &CacheSettings, coordinator: Arc<InvalidationCoordinator>) -> Self {
        let inner = Cache::builder()
            .max_capacity(settings.max_entries)
            .time_to_idle(settings.tti())
            .build();
        Self { inner, coordinator }
    }

    fn is_fresh(&self, entry: &TaggedEntry<V>) -> bool {
        entry
            .stamps
            .iter()
            .all(|(tag, epoch)| self.coordinator.epoch(tag) == *epoch)
    }

    /// Fetch a cached value, dropping it when any of its tags moved.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.inner.get(key)?;
        if self.is_fresh(&entry) {
            Some(entry.value)
        } else {
            self.inner.invalidate(key);
            None
        }
    }

    /// Register a value under its tags at the current epochs.
    pub fn insert(&self, key: String, value: V, tags: Vec<CacheTag>) {
        let stamps = tags
            .into_iter()
            .map(|tag| {
                let epoch = self.coordinator.epoch(&tag);
                (tag, epoch)
            })
            .collect();
        self.inner.insert(
            key,
            TaggedEntry {
                value,
                stamps: Arc::new(stamps),
            },
        );
    }

    /// Read-through: return the fresh cached value or compute, register, and
    /// return. Concurrent misses may compute more than once; the last insert
    /// wins, which is harmless for pure reads.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: String,
        tags: Vec<CacheTag>,
        compute: F,
    ) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute().await?;
        self.insert(key, value.clone(), tags);
        Ok(value)
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbordb_commons::{ProjectId, TableRef};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cache() -> (TaggedCache<String>, Arc<InvalidationCoordinator>) {
        let coordinator = Arc::new(InvalidationCoordinator::new());
        let cache = TaggedCache::new(&CacheSettings::default(), Arc::clone(&coordinator));
        (cache, coordinator)
    }

    fn rows_tag() -> CacheTag {
        CacheTag::table_rows(&ProjectId::new("p1"), &TableRef::new("public", "t"))
    }

    #[tokio::test]
    async fn test_read_through_computes_once_until_invalidated() {
        let (cache, coordinator) = cache();
        let computes = AtomicU32::new(0);

        let compute = || async {
            computes.fetch_add(1, Ordering::SeqCst);
            Ok("v1".to_string())
        };

        let v = cache
            .get_or_compute("k".into(), vec![rows_tag()], compute)
            .await
            .unwrap();
        assert_eq!(v, "v1");

        // Served from cache; no recompute.
        let v = cache
            .get_or_compute("k".into(), vec![rows_tag()], || async {
                computes.fetch_add(1, Ordering::SeqCst);
                Ok("v2".to_string())
            })
            .await
            .unwrap();
        assert_eq!(v, "v1");
        assert_eq!(computes.load(Ordering::SeqCst), 1);

        // Invalidation forces the next read to recompute and re-register.
        coordinator.invalidate(&rows_tag());
        let v = cache
            .get_or_compute("k".into(), vec![rows_tag()], || async {
                computes.fetch_add(1, Ordering::SeqCst);
                Ok("v3".to_string())
            })
            .await
            .unwrap();
        assert_eq!(v, "v3");
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stale_entry_is_dropped_not_served() {
        let (cache, coordinator) = cache();
        cache.insert("k".into(), "old".to_string(), vec![rows_tag()]);
        assert_eq!(cache.get("k"), Some("old".to_string()));

        coordinator.invalidate(&rows_tag());
        assert_eq!(cache.get("k"), None);
        // The write visible after invalidation replaces the entry.
        cache.insert("k".into(), "new".to_string(), vec![rows_tag()]);
        assert_eq!(cache.get("k"), Some("new".to_string()));
    }

    #[test]
    fn test_any_stale_tag_expires_the_entry() {
        let (cache, coordinator) = cache();
        let project_tag = CacheTag::project_data(&ProjectId::new("p1"));
        cache.insert(
            "k".into(),
            "v".to_string(),
            vec![rows_tag(), project_tag.clone()],
        );

        // Only the project-wide tag moves (e.g. free-form SQL ran).
        coordinator.invalidate(&project_tag);
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_double_invalidation_no_double_side_effect() {
        let (cache, coordinator) = cache();
        cache.insert("k".into(), "v".to_string(), vec![rows_tag()]);

        coordinator.invalidate(&rows_tag());
        coordinator.invalidate(&rows_tag());
        assert_eq!(cache.get("k"), None);

        // A value registered after both invalidations stays fresh.
        cache.insert("k".into(), "v2".to_string(), vec![rows_tag()]);
        assert_eq!(cache.get("k"), Some("v2".to_string()));
    }

    #[test]
    fn test_documented_staleness_window() {
        // A read cached before a write is intentionally served until the
        // write path invalidates; the window closes at invalidation time.
        let (cache, coordinator) = cache();
        cache.insert("listing".into(), "pre-write".to_string(), vec![rows_tag()]);

        // Write happened, invalidation not yet triggered: stale value served.
        assert_eq!(cache.get("listing"), Some("pre-write".to_string()));

        // The mutation path invalidates before responding; next read misses.
        coordinator.invalidate(&rows_tag());
        assert_eq!(cache.get("listing"), None);
    }
}
