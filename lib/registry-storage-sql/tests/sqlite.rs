//! End-to-end behavior against a real SQLite database.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{CapturedLogs, events, manager_for, models, open, tags, versions};
use registry_storage_sql::{
    MemoryIdSequence, OrderByField, Predicate, PreparedSql, SearchQuery, SqlExecutor,
    StatementKey, Storable, StorableKey, StorageError, StorageExecutor, Value, ensure_unique,
};
use serde_json::json;
use tempfile::TempDir;
use tracing::Level;

fn model(name: &str) -> Storable {
    Storable::new(&models()).with("name", name)
}

#[tokio::test]
async fn insert_returns_generated_id_and_reads_back_equal() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let added = manager
        .add(
            model("m1")
                .with("version", 1)
                .with("score", 0.5)
                .with("active", true),
        )
        .await
        .unwrap();
    assert!(added.id().is_some());

    let fetched = manager.get(&added.storable_key()).await.unwrap();
    assert_eq!(fetched, added);
}

#[tokio::test]
async fn generated_ids_are_distinct() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let first = manager.add(model("m1")).await.unwrap();
    let second = manager.add(model("m2")).await.unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(manager.list("models").await.unwrap().len(), 2);
}

#[tokio::test]
async fn identical_rows_get_distinct_ids() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let tag = Storable::new(&tags()).with("name", "m1");
    let first = manager.add(tag.clone()).await.unwrap();
    let second = manager.add(tag).await.unwrap();

    assert!(first.id().is_some());
    assert!(second.id().is_some());
    assert_ne!(first.id(), second.id());
    assert_eq!(manager.list("tags").await.unwrap().len(), 2);
}

#[tokio::test]
async fn missing_generated_key_defers_the_id() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let event = Storable::new(&events()).with("label", "created");
    let added = manager.add(event.clone()).await.unwrap();
    assert_eq!(added.id(), None);
    assert_eq!(added, event);
    assert_eq!(manager.next_id("events").await.unwrap(), None);
}

#[tokio::test]
async fn id_sequence_preallocates_ids() {
    let dir = TempDir::new().unwrap();
    let ids = Arc::new(MemoryIdSequence::new());
    ids.seed("events", 100);
    let executor = open(&dir, json!({}), None).await.with_id_sequence(ids);
    let manager = manager_for(Arc::new(executor));

    let added = manager
        .add(Storable::new(&events()).with("label", "created"))
        .await
        .unwrap();
    assert_eq!(added.id(), Some(101));
    assert_eq!(manager.get(&added.storable_key()).await.unwrap(), added);
    assert_eq!(manager.next_id("events").await.unwrap(), Some(102));
}

#[tokio::test]
async fn removed_storable_is_not_found() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let added = manager.add(model("m1")).await.unwrap();
    let key = added.storable_key();
    assert_eq!(manager.remove(&key).await.unwrap(), added);
    assert!(matches!(
        manager.get(&key).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn composite_keys_address_exactly_one_row() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    for version in [1, 2] {
        manager
            .add(
                Storable::new(&versions())
                    .with("model_id", 1i64)
                    .with("version", version),
            )
            .await
            .unwrap();
    }

    let partial = StorableKey::new("versions").with("model_id", 1i64);
    assert!(matches!(
        manager.remove(&partial).await.unwrap_err(),
        StorageError::SchemaMismatch(_)
    ));
    assert!(matches!(
        manager.get(&StorableKey::new("versions")).await.unwrap_err(),
        StorageError::SchemaMismatch(_)
    ));
    assert_eq!(manager.list("versions").await.unwrap().len(), 2);

    let removed = manager.remove(&partial.with("version", 2)).await.unwrap();
    assert_eq!(removed.get("version"), Some(&Value::Int(2)));
    let left = manager.list("versions").await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].get("version"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn delete_of_missing_row_removes_nothing() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(open(&dir, json!({}), None).await);
    let _manager = manager_for(executor.clone());

    let key = StorableKey::new("models").with("id", 404i64);
    assert_eq!(executor.delete(&key).await.unwrap(), 0);
}

#[tokio::test]
async fn ordered_listing_follows_the_requested_direction() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    for (name, version) in [("m1", 2), ("m2", 7), ("m3", 4)] {
        manager
            .add(model(name).with("version", version))
            .await
            .unwrap();
    }

    let listed = manager
        .list_ordered("models", &[OrderByField::desc("version")])
        .await
        .unwrap();
    let versions: Vec<i64> = listed
        .iter()
        .map(|m| m.get("version").and_then(Value::as_i64).unwrap())
        .collect();
    assert_eq!(versions, vec![7, 4, 2]);
}

#[tokio::test]
async fn search_operators_filter_rows() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(open(&dir, json!({}), None).await);
    let manager = manager_for(executor.clone());

    for (name, version) in [("alpha", 1), ("alpine", 5), ("beta*", 9), ("gamma", 3)] {
        manager
            .add(model(name).with("version", version))
            .await
            .unwrap();
    }
    manager.add(model("delta")).await.unwrap();

    let names = |rows: Vec<Storable>| -> Vec<String> {
        let mut names: Vec<String> = rows
            .iter()
            .map(|r| r.get("name").and_then(Value::as_str).unwrap().to_string())
            .collect();
        names.sort();
        names
    };

    let found = manager
        .find("models", vec![Predicate::StartsWith("name".into(), "alp".into())])
        .await
        .unwrap();
    assert_eq!(names(found), vec!["alpha", "alpine"]);

    // glob metacharacters in the prefix match literally
    let found = manager
        .find("models", vec![Predicate::StartsWith("name".into(), "beta*".into())])
        .await
        .unwrap();
    assert_eq!(names(found), vec!["beta*"]);
    let found = manager
        .find("models", vec![Predicate::StartsWith("name".into(), "b*".into())])
        .await
        .unwrap();
    assert!(found.is_empty());

    let found = manager
        .find("models", vec![Predicate::Between("version".into(), 2.into(), 6.into())])
        .await
        .unwrap();
    assert_eq!(names(found), vec!["alpine", "gamma"]);

    let found = manager
        .find("models", vec![Predicate::IsNull("version".into())])
        .await
        .unwrap();
    assert_eq!(names(found), vec!["delta"]);

    let query = SearchQuery::new("models")
        .r#in("name", ["alpha", "gamma", "omega"])
        .gt("version", 1)
        .order_by(OrderByField::asc("name"));
    let found = executor.search(&query).await.unwrap();
    assert_eq!(names(found), vec!["gamma"]);

    let query = SearchQuery::new("models").r#in("name", Vec::<String>::new());
    assert!(executor.search(&query).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_fields_surface_as_schema_mismatch() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let err = manager
        .find("models", vec![Predicate::Eq("owner".into(), "x".into())])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::SchemaMismatch(_)));
}

#[tokio::test]
async fn upsert_updates_an_existing_row() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let added = manager.add(model("m1").with("version", 1)).await.unwrap();
    let id = added.id().unwrap();

    let changed = Storable::new(&models())
        .with("id", id)
        .with("name", "m1")
        .with("version", 2);
    manager.add_or_update(changed.clone()).await.unwrap();

    assert_eq!(manager.get(&added.storable_key()).await.unwrap(), changed);
    assert_eq!(manager.list("models").await.unwrap().len(), 1);
}

#[tokio::test]
async fn upsert_inserts_a_new_row() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let stored = manager.add_or_update(model("m1")).await.unwrap();
    assert!(stored.id().is_some());
    assert_eq!(manager.get(&stored.storable_key()).await.unwrap(), stored);
}

const REJECT_BOOM: &str = "CREATE TRIGGER reject_boom BEFORE INSERT ON models
    WHEN NEW.name = 'boom'
    BEGIN SELECT RAISE(ABORT, 'insert rejected'); END";

#[tokio::test]
async fn always_fallback_swallows_any_execution_error() {
    let dir = TempDir::new().unwrap();
    let logs = CapturedLogs::default();
    let executor = open(&dir, json!({ "upsertFallback": "always" }), Some(logs.dispatch())).await;
    sqlx::query(REJECT_BOOM)
        .execute(executor.pool())
        .await
        .unwrap();
    let manager = manager_for(Arc::new(executor));

    let boom = Storable::new(&models()).with("id", 9i64).with("name", "boom");
    let returned = manager.add_or_update(boom.clone()).await.unwrap();
    assert_eq!(returned, boom);

    let warnings = logs.messages_at(Level::WARN);
    assert!(warnings.iter().any(|m| m.contains("falling back to update")));
    assert!(warnings.iter().any(|m| m.contains("matched no row")));
    assert!(matches!(
        manager.get(&boom.storable_key()).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn conflict_fallback_surfaces_other_execution_errors() {
    let dir = TempDir::new().unwrap();
    let logs = CapturedLogs::default();
    let executor = open(&dir, json!({}), Some(logs.dispatch())).await;
    sqlx::query(REJECT_BOOM)
        .execute(executor.pool())
        .await
        .unwrap();
    let manager = manager_for(Arc::new(executor));

    let boom = Storable::new(&models()).with("id", 9i64).with("name", "boom");
    let err = manager.add_or_update(boom).await.unwrap_err();
    assert!(matches!(err, StorageError::Execution { .. }));
    assert!(!err.is_unique_violation());
    assert!(logs.messages_at(Level::WARN).is_empty());
}

#[tokio::test]
async fn conflict_fallback_surfaces_a_violation_the_update_cannot_resolve() {
    let dir = TempDir::new().unwrap();
    let logs = CapturedLogs::default();
    let executor = open(&dir, json!({}), Some(logs.dispatch())).await;
    let manager = manager_for(Arc::new(executor));

    let original = manager.add(model("m1").with("version", 1)).await.unwrap();

    // a second row under a new id reusing the unique name
    let clash = model("m1").with("id", 77i64).with("version", 3);
    let err = manager.add_or_update(clash.clone()).await.unwrap_err();
    assert!(err.is_unique_violation());

    let warnings = logs.messages_at(Level::WARN);
    assert!(warnings.iter().any(|m| m.contains("falling back to update")));
    assert!(warnings.iter().any(|m| m.contains("matched no row")));
    assert!(matches!(
        manager.get(&clash.storable_key()).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
    assert_eq!(
        manager.get(&original.storable_key()).await.unwrap(),
        original
    );

    // plain inserts never fall back
    let err = manager.add(model("m1")).await.unwrap_err();
    assert!(err.is_unique_violation());
}

#[tokio::test]
async fn always_fallback_reports_success_for_a_violation() {
    let dir = TempDir::new().unwrap();
    let executor = open(&dir, json!({ "upsertFallback": "always" }), None).await;
    let manager = manager_for(Arc::new(executor));

    manager.add(model("m1")).await.unwrap();
    let clash = model("m1").with("id", 77i64);
    assert_eq!(manager.add_or_update(clash.clone()).await.unwrap(), clash);
    assert!(matches!(
        manager.get(&clash.storable_key()).await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn exhausted_pool_fails_acquisition() {
    let dir = TempDir::new().unwrap();
    let executor = open(
        &dir,
        json!({ "maximumPoolSize": 1, "connectionTimeout": 100 }),
        None,
    )
    .await;
    let executor = Arc::new(executor);
    let manager = manager_for(executor.clone());

    let held = executor.pool().acquire().await.unwrap();
    let err = manager.list("models").await.unwrap_err();
    assert!(matches!(err, StorageError::ConnectionAcquisition(_)));

    drop(held);
    assert!(manager.list("models").await.unwrap().is_empty());
}

#[tokio::test]
async fn statement_cache_stays_bounded_by_pool_size() {
    let dir = TempDir::new().unwrap();
    let evictions = Arc::new(AtomicUsize::new(0));
    let counter = evictions.clone();
    let executor: SqlExecutor = open(&dir, json!({ "maximumPoolSize": 2 }), None)
        .await
        .with_eviction_hook(Arc::new(move |_key: &StatementKey, _sql: &PreparedSql| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    let executor = Arc::new(executor);
    let manager = manager_for(executor.clone());

    let added = manager.add(model("m1")).await.unwrap();
    manager.get(&added.storable_key()).await.unwrap();
    manager.list("models").await.unwrap();
    manager
        .list_ordered("models", &[OrderByField::asc("name")])
        .await
        .unwrap();
    manager
        .find("models", vec![Predicate::Eq("name".into(), "m1".into())])
        .await
        .unwrap();

    let cache = executor.statement_cache();
    assert_eq!(cache.capacity(), 2);
    assert!(cache.len() <= 2);
    assert_eq!(evictions.load(Ordering::SeqCst), 3);

    // same shape, different value: served from the cache
    let before = cache.stats();
    manager
        .find("models", vec![Predicate::Eq("name".into(), "m2".into())])
        .await
        .unwrap();
    assert_eq!(cache.stats().hits, before.hits + 1);
}

#[tokio::test]
async fn cache_activity_is_logged_through_the_injected_dispatch() {
    let dir = TempDir::new().unwrap();
    let logs = CapturedLogs::default();
    let executor = open(&dir, json!({}), Some(logs.dispatch())).await;
    let manager = manager_for(Arc::new(executor));

    manager.list("models").await.unwrap();
    manager.list("models").await.unwrap();

    assert!(
        logs.messages_at(Level::INFO)
            .iter()
            .any(|m| m.contains("storage executor ready"))
    );
    let debug = logs.messages_at(Level::DEBUG);
    assert!(debug.iter().any(|m| m.contains("statement cache miss")));
    assert!(debug.iter().any(|m| m.contains("statement cache hit")));
}

#[tokio::test]
async fn ensure_unique_checks_other_rows() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    let first = manager
        .add(model("m1").with("version", 1))
        .await
        .unwrap();
    ensure_unique(&manager, &first, &["name"]).await.unwrap();

    let candidate = model("other").with("version", 1);
    let err = ensure_unique(&manager, &candidate, &["version"])
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateEntity(_)));

    ensure_unique(&manager, &candidate, &["name"]).await.unwrap();
}

#[tokio::test]
async fn unregistered_namespace_is_reported() {
    let dir = TempDir::new().unwrap();
    let manager = manager_for(Arc::new(open(&dir, json!({}), None).await));

    assert!(matches!(
        manager.list("files").await.unwrap_err(),
        StorageError::UnknownNamespace(_)
    ));
}
