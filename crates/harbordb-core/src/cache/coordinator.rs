//! Invalidation coordinator: tag epochs plus the explicit mutation table.
//!
//! Every tag carries a monotonically increasing epoch. A cached read records
//! the epochs of its tags at registration time; the read is stale as soon as
//! any of those epochs moves. Invalidating a tag twice in succession is the
//! same as invalidating it once — the second bump only matters to entries
//! registered in between, which is exactly the desired semantics.

use super::tags::CacheTag;
use dashmap::DashMap;
use harbordb_commons::{ProjectId, TableRef};
use log::debug;

/// Mutation paths that must invalidate cached reads. The mapping from
/// mutation to affected tags is the enumerable table in `affected_tags` —
/// explicit, not inferred.
#[derive(Debug, Clone)]
pub enum Mutation {
    RowsInserted { project: ProjectId, table: TableRef },
    RowsUpdated { project: ProjectId, table: TableRef },
    RowsDeleted { project: ProjectId, table: TableRef },
    /// Column/index/trigger changes on one table.
    SchemaChanged { project: ProjectId, table: TableRef },
    TableCreated { project: ProjectId, schema: String },
    TableDropped { project: ProjectId, table: TableRef },
    /// Free-form SQL: the affected tables cannot be named, so the whole
    /// project's cached reads expire (over-invalidation, acceptable).
    RawSql { project: ProjectId },
    TenantRemoved { project: ProjectId },
}

impl Mutation {
    /// The explicit mutation → tags table.
    pub fn affected_tags(&self) -> Vec<CacheTag> {
        match self {
            Mutation::RowsInserted { project, table }
            | Mutation::RowsUpdated { project, table }
            | Mutation::RowsDeleted { project, table } => {
                vec![CacheTag::table_rows(project, table)]
            }
            Mutation::SchemaChanged { project, table } => vec![
                CacheTag::table_rows(project, table),
                CacheTag::table_schema(project, table),
            ],
            Mutation::TableCreated { project, schema } => {
                vec![CacheTag::table_list(project, schema)]
            }
            Mutation::TableDropped { project, table } => vec![
                CacheTag::table_rows(project, table),
                CacheTag::table_schema(project, table),
                CacheTag::table_list(project, table.schema()),
            ],
            Mutation::RawSql { project } | Mutation::TenantRemoved { project } => {
                vec![CacheTag::project_data(project)]
            }
        }
    }
}

/// Single writer of tag epochs; shared by every tagged cache in the process.
#[derive(Default)]
pub struct InvalidationCoordinator {
    epochs: DashMap<CacheTag, u64>,
}

impl InvalidationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch of a tag. Tags that were never invalidated sit at 0.
    pub fn epoch(&self, tag: &CacheTag) -> u64 {
        self.epochs.get(tag).map(|e| *e).unwrap_or(0)
    }

    /// Mark every read registered under `tag` as stale.
    pub fn invalidate(&self, tag: &CacheTag) {
        let mut entry = self.epochs.entry(tag.clone()).or_insert(0);
        *entry += 1;
        debug!("Invalidated {} (epoch {})", tag, *entry);
    }

    /// Invalidate every tag a mutation affects.
    pub fn apply(&self, mutation: &Mutation) {
        for tag in mutation.affected_tags() {
            self.invalidate(&tag);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_moves_on_invalidate() {
        let coordinator = InvalidationCoordinator::new();
        let tag = CacheTag::project_data(&ProjectId::new("p1"));

        assert_eq!(coordinator.epoch(&tag), 0);
        coordinator.invalidate(&tag);
        assert_eq!(coordinator.epoch(&tag), 1);
    }

    #[test]
    fn test_double_invalidation_is_idempotent_for_readers() {
        let coordinator = InvalidationCoordinator::new();
        let tag = CacheTag::project_data(&ProjectId::new("p1"));

        // A reader registered at epoch 0 is stale after one invalidation;
        // a second invalidation changes nothing it can observe.
        let registered_at = coordinator.epoch(&tag);
        coordinator.invalidate(&tag);
        assert_ne!(coordinator.epoch(&tag), registered_at);
        coordinator.invalidate(&tag);
        assert_ne!(coordinator.epoch(&tag), registered_at);
    }

    #[test]
    fn test_row_mutations_hit_only_their_table() {
        let coordinator = InvalidationCoordinator::new();
        let project = ProjectId::new("p1");
        let orders = TableRef::new("public", "orders");
        let users = TableRef::new("public", "users");

        coordinator.apply(&Mutation::RowsInserted {
            project: project.clone(),
            table: orders.clone(),
        });

        assert_eq!(coordinator.epoch(&CacheTag::table_rows(&project, &orders)), 1);
        assert_eq!(coordinator.epoch(&CacheTag::table_rows(&project, &users)), 0);
        // Row writes do not touch the schema tag.
        assert_eq!(coordinator.epoch(&CacheTag::table_schema(&project, &orders)), 0);
    }

    #[test]
    fn test_schema_change_hits_rows_and_schema() {
        let coordinator = InvalidationCoordinator::new();
        let project = ProjectId::new("p1");
        let orders = TableRef::new("public", "orders");

        coordinator.apply(&Mutation::SchemaChanged {
            project: project.clone(),
            table: orders.clone(),
        });

        assert_eq!(coordinator.epoch(&CacheTag::table_rows(&project, &orders)), 1);
        assert_eq!(coordinator.epoch(&CacheTag::table_schema(&project, &orders)), 1);
    }

    #[test]
    fn test_drop_table_hits_listing_too() {
        let coordinator = InvalidationCoordinator::new();
        let project = ProjectId::new("p1");
        let orders = TableRef::new("public", "orders");

        coordinator.apply(&Mutation::TableDropped {
            project: project.clone(),
            table: orders.clone(),
        });

        assert_eq!(coordinator.epoch(&CacheTag::table_list(&project, "public")), 1);
    }
}
