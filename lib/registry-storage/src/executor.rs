//! Executor and id-sequence traits implemented by storage backends.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{OrderByField, Schema, SearchQuery, Storable, StorableKey, StorageError};

/// Trait for executing storable operations against one database dialect.
///
/// Each call is self-contained: compile, acquire a connection, bind,
/// execute, map the result, release the connection.
#[async_trait]
pub trait StorageExecutor: Send + Sync {
    /// Make a namespace's schema known to this executor.
    fn register_schema(&self, schema: Arc<Schema>);

    /// Insert a storable.
    ///
    /// When the identity field is absent the database (or the configured
    /// id sequence) supplies it. The returned storable carries the id when
    /// one is observable; dialects that defer issuance return it without.
    async fn insert(&self, storable: Storable) -> Result<Storable, StorageError>;

    /// Insert, or update the row with the same primary key.
    async fn insert_or_update(&self, storable: Storable) -> Result<Storable, StorageError>;

    /// All storables of a namespace, in engine order.
    async fn select(&self, namespace: &str) -> Result<Vec<Storable>, StorageError>;

    /// All storables of a namespace, in the requested order.
    async fn select_ordered(
        &self,
        namespace: &str,
        order_by: &[OrderByField],
    ) -> Result<Vec<Storable>, StorageError>;

    /// Storables matching a key.
    async fn select_by_key(&self, key: &StorableKey) -> Result<Vec<Storable>, StorageError>;

    async fn select_by_key_ordered(
        &self,
        key: &StorableKey,
        order_by: &[OrderByField],
    ) -> Result<Vec<Storable>, StorageError>;

    /// Storables matching a search query.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Storable>, StorageError>;

    /// Delete by key and return the number of rows removed. Deleting a
    /// missing row is not an error.
    async fn delete(&self, key: &StorableKey) -> Result<u64, StorageError>;

    /// Pre-allocate the next id for a namespace.
    ///
    /// `None` for dialects that assign ids at insert time.
    async fn next_id(&self, namespace: &str) -> Result<Option<i64>, StorageError>;
}

/// Application-level id allocation for dialects that pre-allocate ids.
#[async_trait]
pub trait IdSequence: Send + Sync {
    async fn next_id(&self, namespace: &str) -> Result<i64, StorageError>;
}

/// In-process id sequence, one counter per namespace.
#[derive(Debug, Default)]
pub struct MemoryIdSequence {
    counters: Mutex<HashMap<String, i64>>,
}

impl MemoryIdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a namespace's sequence after `last` (e.g. the current maximum id).
    pub fn seed(&self, namespace: impl Into<String>, last: i64) {
        self.counters.lock().insert(namespace.into(), last);
    }
}

#[async_trait]
impl IdSequence for MemoryIdSequence {
    async fn next_id(&self, namespace: &str) -> Result<i64, StorageError> {
        let mut counters = self.counters.lock();
        let counter = counters.entry(namespace.to_string()).or_insert(0);
        *counter = counter.checked_add(1).ok_or_else(|| {
            StorageError::execution(format!("id sequence for '{}' is exhausted", namespace))
        })?;
        Ok(*counter)
    }
}
