//! SQL backend for registry-storage.
//!
//! One executor type serves PostgreSQL, MySQL/MariaDB and SQLite through
//! sqlx's `Any` driver; the [`Dialect`] picked from configuration decides
//! the SQL it emits and how result rows are normalized.
//!
//! # Usage
//!
//! ```text
//! let config = StorageConfig::from_json(r#"{
//!     "dataSourceClassName": "org.postgresql.ds.PGSimpleDataSource",
//!     "dataSource.url": "postgres://registry@localhost/registry",
//!     "queryTimeoutInSecs": 5
//! }"#)?;
//! let executor = Arc::new(SqlExecutor::connect(&config).await?);
//!
//! let mut manager = StorageManager::new();
//! manager.register(models_schema, executor);
//! let model = manager.add(Storable::new(&models_schema).with("name", "m1")).await?;
//! ```
//!
//! Statements are compiled from value-free [`StatementKey`]s and kept in
//! a bounded LRU [`StatementCache`] sized to the connection pool.

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::unwrap_in_result,
        clippy::panic
    )
)]

mod bind;
mod cache;
mod config;
mod dialect;
mod executor;
mod mapper;
mod statement;

pub use bind::bind_params;
pub use cache::{CacheStats, EvictionHook, Lookup, StatementCache};
pub use config::{
    CONNECTION_TIMEOUT, DATA_SOURCE_CLASS_NAME, DATA_SOURCE_URL, ExecutionConfig,
    MAXIMUM_POOL_SIZE, QUERY_TIMEOUT_IN_SECS, StorageConfig, UPSERT_FALLBACK, UpsertFallback,
};
pub use dialect::{Dialect, KeyRetrieval, SelectTarget};
pub use executor::SqlExecutor;
pub use mapper::{Cell, RawRow, read_row, to_storable};
pub use statement::{CompiledStatement, Condition, Op, Param, Plan, PreparedSql, StatementKey};

// Re-export core types for convenience
pub use registry_storage::{
    ExecutionKind, FieldType, IdSequence, MemoryIdSequence, OrderByField, Predicate, Schema,
    SearchQuery, Storable, StorableKey, StorageError, StorageExecutor, StorageManager, Value,
    ensure_unique,
};
