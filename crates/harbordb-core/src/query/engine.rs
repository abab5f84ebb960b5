//! Query engine.
//!
//! Turns validated descriptors into parameterized SQL against a tenant pool
//! and returns column-oriented pages with an authoritative total row count.
//! Reads register under cache tags; mutation helpers invalidate them through
//! the coordinator's explicit mapping.

use crate::cache::{CacheTag, InvalidationCoordinator, Mutation, TaggedCache};
use crate::error::{HarborError, Result};
use crate::pools::PoolRegistry;
use crate::query::builder::{self, BuiltStatement};
use crate::query::catalog::{self, TableCatalog};
use crate::query::descriptor::{Filter, QueryDescriptor};
use crate::query::values;
use dashmap::DashMap;
use harbordb_commons::config::{CacheSettings, QuerySettings};
use harbordb_commons::{ProjectId, TableRef};
use log::{debug, warn};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tokio_postgres::{IsolationLevel, Row, SimpleQueryMessage};

/// Column-oriented result page: one cell sequence per column (all equal
/// length = rows in this page) plus the total matching-row count,
/// independent of limit/offset.
#[derive(Debug, Clone)]
pub struct ColumnarPage {
    columns: Vec<(String, Vec<JsonValue>)>,
    row_count: u64,
}

impl ColumnarPage {
    pub fn new(columns: Vec<(String, Vec<JsonValue>)>, row_count: u64) -> Self {
        Self { columns, row_count }
    }

    /// Total rows matching the filters, ignoring paging.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Rows in this page.
    pub fn page_len(&self) -> usize {
        self.columns.first().map(|(_, v)| v.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&[JsonValue]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

struct RowsMap<'a>(&'a [(String, Vec<JsonValue>)]);

impl Serialize for RowsMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, cells) in self.0 {
            map.serialize_entry(name, cells)?;
        }
        map.end()
    }
}

impl Serialize for ColumnarPage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Column order is meaningful to table browsers; serialize as an
        // ordered map, not an alphabetized one.
        let mut out = serializer.serialize_struct("ColumnarPage", 2)?;
        out.serialize_field("rows", &RowsMap(&self.columns))?;
        out.serialize_field("row_count", &self.row_count)?;
        out.end()
    }
}

/// Result of a free-form SQL execution: row-oriented, cells as text.
#[derive(Debug, Clone, Serialize)]
pub struct RawQueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    pub rows_affected: u64,
}

/// The engine. One per process, shared across requests.
pub struct QueryEngine {
    registry: Arc<PoolRegistry>,
    coordinator: Arc<InvalidationCoordinator>,
    pages: TaggedCache<Arc<ColumnarPage>>,
    catalogs: TaggedCache<Arc<TableCatalog>>,
    listings: TaggedCache<Arc<Vec<String>>>,
    settings: QuerySettings,
    /// Consecutive timeouts per project; resets on success.
    timeout_strikes: DashMap<ProjectId, u32>,
}

impl QueryEngine {
    pub fn new(
        registry: Arc<PoolRegistry>,
        coordinator: Arc<InvalidationCoordinator>,
        cache_settings: &CacheSettings,
        settings: QuerySettings,
    ) -> Self {
        Self {
            registry,
            pages: TaggedCache::new(cache_settings, Arc::clone(&coordinator)),
            catalogs: TaggedCache::new(cache_settings, Arc::clone(&coordinator)),
            listings: TaggedCache::new(cache_settings, Arc::clone(&coordinator)),
            coordinator,
            settings,
            timeout_strikes: DashMap::new(),
        }
    }

    pub fn coordinator(&self) -> Arc<InvalidationCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Execute a descriptor read, served from the tagged cache when fresh.
    pub async fn query(
        &self,
        project: &ProjectId,
        descriptor: &QueryDescriptor,
    ) -> Result<Arc<ColumnarPage>> {
        let key = format!("rows:{}:{}", project, descriptor.fingerprint());
        let tags = vec![
            CacheTag::table_rows(project, &descriptor.table),
            CacheTag::project_data(project),
        ];
        self.pages
            .get_or_compute(key, tags, || async {
                self.fetch_page(project, descriptor).await.map(Arc::new)
            })
            .await
    }

    /// Introspect (and cache) one table's catalog.
    pub async fn table_columns(
        &self,
        project: &ProjectId,
        table: &TableRef,
    ) -> Result<Arc<TableCatalog>> {
        let key = format!("catalog:{}:{}", project, table);
        let tags = vec![
            CacheTag::table_schema(project, table),
            CacheTag::project_data(project),
        ];
        self.catalogs
            .get_or_compute(key, tags, || async {
                let client = self.registry.acquire(project).await?;
                let catalog = catalog::introspect(&client, table).await?;
                Ok(Arc::new(catalog))
            })
            .await
    }

    /// List base tables in one schema, cached under the listing tag.
    pub async fn list_tables(
        &self,
        project: &ProjectId,
        schema: &str,
    ) -> Result<Arc<Vec<String>>> {
        let key = format!("tables:{}:{}", project, schema);
        let tags = vec![
            CacheTag::table_list(project, schema),
            CacheTag::project_data(project),
        ];
        self.listings
            .get_or_compute(key, tags, || async {
                let client = self.registry.acquire(project).await?;

                let known = client
                    .query(
                        "SELECT 1 FROM information_schema.schemata WHERE schema_name = $1",
                        &[&schema],
                    )
                    .await
                    .map_err(|e| HarborError::execution(e.to_string()))?;
                if known.is_empty() {
                    return Err(crate::error::ValidationError::UnknownSchema(
                        schema.to_string(),
                    )
                    .into());
                }

                let rows = client
                    .query(
                        "SELECT table_name FROM information_schema.tables \
                         WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
                         ORDER BY table_name",
                        &[&schema],
                    )
                    .await
                    .map_err(|e| HarborError::execution(e.to_string()))?;
                Ok(Arc::new(rows.iter().map(|r| r.get(0)).collect()))
            })
            .await
    }

    /// Insert one row; invalidates the table's row listings.
    pub async fn insert_row(
        &self,
        project: &ProjectId,
        table: &TableRef,
        row: &serde_json::Map<String, JsonValue>,
    ) -> Result<u64> {
        let catalog = self.table_columns(project, table).await?;
        let built = builder::build_insert(&catalog, row)?;
        let affected = self.execute_statement(project, &built).await?;
        self.coordinator.apply(&Mutation::RowsInserted {
            project: project.clone(),
            table: table.clone(),
        });
        Ok(affected)
    }

    /// Update matching rows; invalidates the table's row listings.
    pub async fn update_rows(
        &self,
        project: &ProjectId,
        table: &TableRef,
        set: &serde_json::Map<String, JsonValue>,
        filters: &[Filter],
    ) -> Result<u64> {
        let catalog = self.table_columns(project, table).await?;
        let built = builder::build_update(&catalog, set, filters)?;
        let affected = self.execute_statement(project, &built).await?;
        self.coordinator.apply(&Mutation::RowsUpdated {
            project: project.clone(),
            table: table.clone(),
        });
        Ok(affected)
    }

    /// Delete matching rows; invalidates the table's row listings.
    pub async fn delete_rows(
        &self,
        project: &ProjectId,
        table: &TableRef,
        filters: &[Filter],
    ) -> Result<u64> {
        let catalog = self.table_columns(project, table).await?;
        let built = builder::build_delete(&catalog, filters)?;
        let affected = self.execute_statement(project, &built).await?;
        self.coordinator.apply(&Mutation::RowsDeleted {
            project: project.clone(),
            table: table.clone(),
        });
        Ok(affected)
    }

    /// Free-form SQL, bypassing descriptor validation by design. Still
    /// routed through the tenant pool, still time-bounded, errors surfaced
    /// verbatim. The affected tables cannot be known, so the whole project's
    /// cached reads expire.
    pub async fn execute_raw(&self, project: &ProjectId, sql: &str) -> Result<RawQueryResult> {
        let client = self.registry.acquire(project).await?;
        let started = Instant::now();
        let deadline = self.settings.timeout();

        let work = client.simple_query(sql);
        // Bound separately so the borrow of `client` ends before the
        // timeout arm takes it out of the pool.
        let outcome = tokio::time::timeout(deadline, work).await;
        match outcome {
            Ok(Ok(messages)) => {
                self.timeout_strikes.remove(project);
                self.coordinator.apply(&Mutation::RawSql {
                    project: project.clone(),
                });
                Ok(Self::raw_result(messages))
            }
            Ok(Err(e)) => Err(HarborError::execution(e.to_string())),
            Err(_) => {
                // The connection is mid-statement; discard it rather than
                // returning it to the pool in an unknown state.
                let _ = deadpool_postgres::Object::take(client);
                self.record_timeout(project);
                Err(HarborError::QueryTimeout {
                    project: project.clone(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Run the page and count statements inside one repeatable-read
    /// transaction so the total matches the page's filter snapshot.
    async fn fetch_page(
        &self,
        project: &ProjectId,
        descriptor: &QueryDescriptor,
    ) -> Result<ColumnarPage> {
        let catalog = self.table_columns(project, &descriptor.table).await?;
        let built = builder::build_select(&catalog, descriptor, &self.settings)?;
        debug!("Project '{}' page query: {}", project, built.page_sql);

        let mut client = self.registry.acquire(project).await?;
        let started = Instant::now();
        let deadline = self.settings.timeout();
        let timeout_ms = deadline.as_millis();

        let work = async {
            let inner: &mut tokio_postgres::Client = &mut client;
            let tx = inner
                .build_transaction()
                .isolation_level(IsolationLevel::RepeatableRead)
                .read_only(true)
                .start()
                .await?;
            // Server-side bound as well; the driver-side timeout below
            // handles a stuck transport.
            tx.batch_execute(&format!("SET LOCAL statement_timeout = {}", timeout_ms))
                .await?;

            let refs = builder::param_refs(&built.params);
            let rows = tx.query(built.page_sql.as_str(), &refs).await?;
            let count_row = tx.query_one(built.count_sql.as_str(), &refs).await?;
            let total: i64 = count_row.get(0);
            tx.commit().await?;
            Ok::<_, tokio_postgres::Error>((rows, total))
        };

        let outcome = tokio::time::timeout(deadline, work).await;
        match outcome {
            Ok(Ok((rows, total))) => {
                self.timeout_strikes.remove(project);
                Ok(Self::page_from_rows(&catalog, descriptor, &rows, total as u64))
            }
            Ok(Err(e)) => Err(HarborError::execution(e.to_string())),
            Err(_) => {
                let _ = deadpool_postgres::Object::take(client);
                self.record_timeout(project);
                Err(HarborError::QueryTimeout {
                    project: project.clone(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    async fn execute_statement(
        &self,
        project: &ProjectId,
        built: &BuiltStatement,
    ) -> Result<u64> {
        let client = self.registry.acquire(project).await?;
        let started = Instant::now();
        let deadline = self.settings.timeout();

        let work = async {
            let refs = builder::param_refs(&built.params);
            client.execute(built.sql.as_str(), &refs).await
        };

        let outcome = tokio::time::timeout(deadline, work).await;
        match outcome {
            Ok(Ok(affected)) => {
                self.timeout_strikes.remove(project);
                Ok(affected)
            }
            Ok(Err(e)) => Err(HarborError::execution(e.to_string())),
            Err(_) => {
                let _ = deadpool_postgres::Object::take(client);
                self.record_timeout(project);
                Err(HarborError::QueryTimeout {
                    project: project.clone(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    fn page_from_rows(
        catalog: &TableCatalog,
        descriptor: &QueryDescriptor,
        rows: &[Row],
        total: u64,
    ) -> ColumnarPage {
        let names: Vec<String> = match &descriptor.columns {
            Some(names) => names.clone(),
            None => catalog.columns.iter().map(|c| c.name.clone()).collect(),
        };

        let mut columns: Vec<(String, Vec<JsonValue>)> = names
            .into_iter()
            .map(|name| (name, Vec::with_capacity(rows.len())))
            .collect();
        for row in rows {
            for (idx, (_, cells)) in columns.iter_mut().enumerate() {
                cells.push(values::cell_to_json(row, idx));
            }
        }
        ColumnarPage::new(columns, total)
    }

    fn raw_result(messages: Vec<SimpleQueryMessage>) -> RawQueryResult {
        let mut columns: Vec<String> = Vec::new();
        let mut rows = Vec::new();
        let mut rows_affected = 0;

        for message in messages {
            match message {
                SimpleQueryMessage::Row(row) => {
                    if columns.is_empty() {
                        columns = row.columns().iter().map(|c| c.name().to_string()).collect();
                    }
                    rows.push(
                        (0..row.len())
                            .map(|i| {
                                row.get(i)
                                    .map(|v| JsonValue::String(v.to_string()))
                                    .unwrap_or(JsonValue::Null)
                            })
                            .collect(),
                    );
                }
                SimpleQueryMessage::CommandComplete(n) => rows_affected += n,
                _ => {}
            }
        }

        RawQueryResult {
            columns,
            rows,
            rows_affected,
        }
    }

    fn record_timeout(&self, project: &ProjectId) {
        let strikes = {
            let mut entry = self.timeout_strikes.entry(project.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        if strikes >= self.settings.degraded_after_timeouts {
            warn!(
                "Project '{}' hit {} consecutive timeouts; removing its pool",
                project, strikes
            );
            self.timeout_strikes.remove(project);
            self.registry.mark_broken(project);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page() -> ColumnarPage {
        ColumnarPage::new(
            vec![
                ("id".to_string(), vec![json!(1), json!(2)]),
                ("name".to_string(), vec![json!("a"), json!("b")]),
            ],
            3,
        )
    }

    #[test]
    fn test_page_invariants() {
        let page = page();
        assert_eq!(page.page_len(), 2);
        assert_eq!(page.row_count(), 3);
        assert_eq!(page.column("id").unwrap(), &[json!(1), json!(2)]);
        assert!(page.column("ghost").is_none());

        // Every column sequence has the page length, not the total count.
        for name in ["id", "name"] {
            assert_eq!(page.column(name).unwrap().len(), page.page_len());
        }
    }

    #[test]
    fn test_page_serializes_column_oriented_in_order() {
        let rendered = serde_json::to_value(page()).unwrap();
        assert_eq!(
            rendered,
            json!({
                "rows": {"id": [1, 2], "name": ["a", "b"]},
                "row_count": 3
            })
        );
        // Column order survives serialization.
        let text = serde_json::to_string(&page()).unwrap();
        assert!(text.find("\"id\"").unwrap() < text.find("\"name\"").unwrap());
    }
}
