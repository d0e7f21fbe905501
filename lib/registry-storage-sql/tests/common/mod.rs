//! Shared fixtures: a throwaway SQLite database and log capture.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use registry_storage_sql::{FieldType, Schema, SqlExecutor, StorageConfig, StorageManager};
use serde_json::{Value, json};
use tempfile::TempDir;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

pub const MODELS_DDL: &str = "CREATE TABLE models (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    version INTEGER,
    score DOUBLE,
    active INTEGER
)";

/// Ids are not generated by the engine for this table.
pub const EVENTS_DDL: &str = "CREATE TABLE events (
    id BIGINT PRIMARY KEY,
    label TEXT
)";

/// No uniqueness beyond the generated id.
pub const TAGS_DDL: &str = "CREATE TABLE tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT
)";

pub const VERSIONS_DDL: &str = "CREATE TABLE versions (
    model_id BIGINT NOT NULL,
    version INTEGER NOT NULL,
    notes TEXT,
    PRIMARY KEY (model_id, version)
)";

pub fn models() -> Schema {
    serde_json::from_value(json!({
        "namespace": "models",
        "fields": [
            { "name": "id", "type": "long" },
            { "name": "name", "type": "string" },
            { "name": "version", "type": "integer" },
            { "name": "score", "type": "double" },
            { "name": "active", "type": "boolean" }
        ],
        "primaryKey": ["id"]
    }))
    .unwrap()
}

pub fn events() -> Schema {
    Schema::builder("events")
        .field("id", FieldType::Long)
        .field("label", FieldType::String)
        .primary_key(["id"])
        .build()
        .unwrap()
}

pub fn tags() -> Schema {
    Schema::builder("tags")
        .field("id", FieldType::Long)
        .field("name", FieldType::String)
        .primary_key(["id"])
        .build()
        .unwrap()
}

pub fn versions() -> Schema {
    Schema::builder("versions")
        .field("model_id", FieldType::Long)
        .field("version", FieldType::Integer)
        .field("notes", FieldType::String)
        .primary_key(["model_id", "version"])
        .build()
        .unwrap()
}

/// Properties for a SQLite file in `dir`, merged with `extra`.
pub fn properties(dir: &TempDir, extra: Value) -> serde_json::Map<String, Value> {
    let url = format!("sqlite://{}/registry.db?mode=rwc", dir.path().display());
    let mut props = serde_json::Map::new();
    props.insert(
        "dataSourceClassName".into(),
        json!("org.sqlite.SQLiteDataSource"),
    );
    props.insert("dataSource.url".into(), json!(url));
    if let Value::Object(extra) = extra {
        props.extend(extra);
    }
    props
}

pub async fn create_tables(executor: &SqlExecutor) {
    for ddl in [MODELS_DDL, EVENTS_DDL, TAGS_DDL, VERSIONS_DDL] {
        sqlx::query(ddl).execute(executor.pool()).await.unwrap();
    }
}

pub async fn open(dir: &TempDir, extra: Value, dispatch: Option<Dispatch>) -> SqlExecutor {
    let config = StorageConfig::from_properties(&properties(dir, extra)).unwrap();
    let executor = SqlExecutor::connect_with_dispatch(&config, dispatch)
        .await
        .unwrap();
    create_tables(&executor).await;
    executor
}

pub fn manager_for(executor: Arc<SqlExecutor>) -> StorageManager {
    let mut manager = StorageManager::new();
    manager.register(models(), executor.clone());
    manager.register(events(), executor.clone());
    manager.register(tags(), executor.clone());
    manager.register(versions(), executor);
    manager
}

/// Records every event's level and message.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl CapturedLogs {
    pub fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .push((*event.metadata().level(), visitor.message));
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}
