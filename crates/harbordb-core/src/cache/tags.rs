//! Cache tag derivation.
//!
//! A tag groups cached reads that must be invalidated together. Every
//! producer and every invalidator derives tags through the constructors here
//! — never by ad hoc string concatenation — so the two sides cannot drift
//! out of sync. Tags are derived on demand and never stored as records.

use harbordb_commons::{ProjectId, TableRef};
use std::fmt;

/// Resource kinds that cached reads group under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// Row listings of one table.
    TableRows,
    /// Column/catalog introspection of one table.
    TableSchema,
    /// The set of tables in one schema.
    TableList,
    /// Everything cached for one project. Included in every read's tag set
    /// so paths that cannot name affected tables (free-form SQL) can still
    /// invalidate correctly by over-invalidating the project.
    ProjectData,
}

impl TagKind {
    fn as_str(&self) -> &'static str {
        match self {
            TagKind::TableRows => "rows",
            TagKind::TableSchema => "schema",
            TagKind::TableList => "tables",
            TagKind::ProjectData => "project",
        }
    }
}

/// A deterministic identifier derived from (kind, scope).
///
/// Same inputs always yield the same tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheTag(String);

impl CacheTag {
    /// The single derivation point. Scope parts join with `/` after the kind.
    fn derive(kind: TagKind, scope: &[&str]) -> Self {
        let mut tag = String::from("tag:");
        tag.push_str(kind.as_str());
        for part in scope {
            tag.push('/');
            tag.push_str(part);
        }
        CacheTag(tag)
    }

    pub fn table_rows(project: &ProjectId, table: &TableRef) -> Self {
        Self::derive(
            TagKind::TableRows,
            &[project.as_str(), table.schema(), table.table()],
        )
    }

    pub fn table_schema(project: &ProjectId, table: &TableRef) -> Self {
        Self::derive(
            TagKind::TableSchema,
            &[project.as_str(), table.schema(), table.table()],
        )
    }

    pub fn table_list(project: &ProjectId, schema: &str) -> Self {
        Self::derive(TagKind::TableList, &[project.as_str(), schema])
    }

    pub fn project_data(project: &ProjectId) -> Self {
        Self::derive(TagKind::ProjectData, &[project.as_str()])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let project = ProjectId::new("p1");
        let table = TableRef::new("public", "orders");
        assert_eq!(
            CacheTag::table_rows(&project, &table),
            CacheTag::table_rows(&project, &table)
        );
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let project = ProjectId::new("p1");
        let orders = TableRef::new("public", "orders");
        let users = TableRef::new("public", "users");

        assert_ne!(
            CacheTag::table_rows(&project, &orders),
            CacheTag::table_rows(&project, &users)
        );
        assert_ne!(
            CacheTag::table_rows(&project, &orders),
            CacheTag::table_schema(&project, &orders)
        );
        assert_ne!(
            CacheTag::table_list(&project, "public"),
            CacheTag::project_data(&project)
        );
    }

    #[test]
    fn test_projects_are_isolated() {
        let table = TableRef::new("public", "orders");
        assert_ne!(
            CacheTag::table_rows(&ProjectId::new("p1"), &table),
            CacheTag::table_rows(&ProjectId::new("p2"), &table)
        );
    }
}
