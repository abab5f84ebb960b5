//! End-to-end scenarios against a real PostgreSQL installation.
//!
//! These tests provision an actual tenant instance, so they need `initdb`
//! and `postgres` on PATH (or configured paths) and are `#[ignore]`-gated:
//!
//! ```sh
//! cargo test --test scenarios -- --ignored
//! ```

use harbordb_commons::{ProjectId, ServerConfig, TableRef};
use harbordb_core::query::{Filter, FilterOp, QueryDescriptor, SortSpec};
use harbordb_core::AppContext;
use serde_json::json;

fn test_config(data_root: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.tenants.data_root = data_root.to_string_lossy().into_owned();
    config.tenants.health_backoff_ms = 200;
    config.tenants.health_attempts = 50;
    config
}

#[tokio::test]
#[ignore = "requires initdb/postgres binaries on PATH"]
async fn test_scenarios_a_b_and_d_against_live_instance() {
    let data_root = tempfile::tempdir().unwrap();
    let context = AppContext::build(test_config(data_root.path()));
    let engine = context.engine();
    let project = ProjectId::new("prj_e2e");
    let table = TableRef::new("public", "t");

    // Provision a new tenant and create the scenario table.
    context.provisioner().provision(&project).await.unwrap();
    engine
        .execute_raw(&project, "CREATE TABLE t (id int, name text)")
        .await
        .unwrap();
    engine
        .execute_raw(
            &project,
            "INSERT INTO t (id, name) VALUES (1, 'a'), (2, 'b'), (3, 'c')",
        )
        .await
        .unwrap();

    // Scenario A: limit=2, offset=0, sort=[id asc].
    let mut descriptor = QueryDescriptor::new(table.clone());
    descriptor.sort.push(SortSpec::asc("id"));
    descriptor.limit = Some(2);

    let page = engine.query(&project, &descriptor).await.unwrap();
    assert_eq!(page.row_count(), 3);
    assert_eq!(page.page_len(), 2);
    assert_eq!(page.column("id").unwrap(), &[json!(1), json!(2)]);
    assert_eq!(page.column("name").unwrap(), &[json!("a"), json!("b")]);

    // Scenario B: filter name = "b".
    let mut descriptor = QueryDescriptor::new(table.clone());
    descriptor
        .filters
        .push(Filter::new("name", FilterOp::Eq, json!("b")));

    let page = engine.query(&project, &descriptor).await.unwrap();
    assert_eq!(page.row_count(), 1);
    assert_eq!(page.column("id").unwrap(), &[json!(2)]);
    assert_eq!(page.column("name").unwrap(), &[json!("b")]);

    // Scenario D: a mutation through the engine invalidates the cached
    // listing; the next identical read reflects the update.
    let mut set = serde_json::Map::new();
    set.insert("name".to_string(), json!("b2"));
    let filters = vec![Filter::new("id", FilterOp::Eq, json!(2))];
    let affected = engine
        .update_rows(&project, &table, &set, &filters)
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let page = engine.query(&project, &descriptor).await.unwrap();
    assert_eq!(page.row_count(), 0, "name = 'b' no longer matches");

    let mut descriptor = QueryDescriptor::new(table.clone());
    descriptor
        .filters
        .push(Filter::new("name", FilterOp::Eq, json!("b2")));
    let page = engine.query(&project, &descriptor).await.unwrap();
    assert_eq!(page.column("id").unwrap(), &[json!(2)]);

    // rowCount independently verified by an unfiltered sweep.
    let unfiltered = QueryDescriptor::new(table.clone());
    let page = engine.query(&project, &unfiltered).await.unwrap();
    assert_eq!(page.row_count(), 3);
    assert_eq!(page.page_len(), 3);

    // Validation failures issue no SQL and name the offender.
    let mut descriptor = QueryDescriptor::new(table.clone());
    descriptor.columns = Some(vec!["ghost".to_string()]);
    let err = engine.query(&project, &descriptor).await.unwrap_err();
    assert!(err.to_string().contains("ghost"));

    // Free-form SQL surfaces database errors verbatim.
    let err = engine
        .execute_raw(&project, "SELECT * FROM missing_table")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing_table"));

    // Teardown stops the instance and discards the tenant.
    assert!(context.provisioner().stop(&project).await.unwrap());
    context.shutdown().await;
}

#[tokio::test]
#[ignore = "requires initdb/postgres binaries on PATH"]
async fn test_numeric_and_temporal_round_trip() {
    let data_root = tempfile::tempdir().unwrap();
    let context = AppContext::build(test_config(data_root.path()));
    let engine = context.engine();
    let project = ProjectId::new("prj_types");
    let table = TableRef::new("public", "measurements");

    context.provisioner().provision(&project).await.unwrap();
    engine
        .execute_raw(
            &project,
            "CREATE TABLE measurements (id bigint, ratio double precision, \
             price numeric(12,4), taken_at timestamptz)",
        )
        .await
        .unwrap();

    let mut row = serde_json::Map::new();
    row.insert("id".to_string(), json!(9_007_199_254_740_991i64));
    row.insert("ratio".to_string(), json!(0.125));
    row.insert("price".to_string(), json!("12345.6789"));
    row.insert("taken_at".to_string(), json!("2026-08-06T12:30:00Z"));
    engine.insert_row(&project, &table, &row).await.unwrap();

    let page = engine
        .query(&project, &QueryDescriptor::new(table.clone()))
        .await
        .unwrap();
    assert_eq!(
        page.column("id").unwrap(),
        &[json!(9_007_199_254_740_991i64)]
    );
    assert_eq!(page.column("ratio").unwrap(), &[json!(0.125)]);
    // Numeric travels as text, full precision preserved.
    assert_eq!(page.column("price").unwrap(), &[json!("12345.6789")]);

    // Temporal filter round-trips through the binding layer.
    let mut descriptor = QueryDescriptor::new(table.clone());
    descriptor.filters.push(Filter::new(
        "taken_at",
        FilterOp::Gte,
        json!("2026-08-06T00:00:00Z"),
    ));
    let page = engine.query(&project, &descriptor).await.unwrap();
    assert_eq!(page.row_count(), 1);

    context.provisioner().stop(&project).await.unwrap();
    context.shutdown().await;
}
