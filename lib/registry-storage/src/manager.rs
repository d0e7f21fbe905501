//! Storage manager facade.
//!
//! Routes calls to the executor registered for a namespace. Holds no
//! business rules: uniqueness and presence checks belong to the domain
//! services calling it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    OrderByField, Predicate, Schema, SearchQuery, Storable, StorableKey, StorageError,
    StorageExecutor,
};

struct Route {
    schema: Arc<Schema>,
    executor: Arc<dyn StorageExecutor>,
}

#[derive(Default)]
pub struct StorageManager {
    routes: HashMap<String, Route>,
}

impl StorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `schema`'s namespace from `executor`. Re-registering a
    /// namespace replaces its route.
    pub fn register(&mut self, schema: Schema, executor: Arc<dyn StorageExecutor>) {
        let schema = Arc::new(schema);
        executor.register_schema(schema.clone());
        self.routes
            .insert(schema.namespace().to_string(), Route { schema, executor });
    }

    pub fn schema(&self, namespace: &str) -> Result<&Schema, StorageError> {
        Ok(&self.route(namespace)?.schema)
    }

    fn route(&self, namespace: &str) -> Result<&Route, StorageError> {
        self.routes
            .get(namespace)
            .ok_or_else(|| StorageError::UnknownNamespace(namespace.to_string()))
    }

    fn executor(&self, namespace: &str) -> Result<&dyn StorageExecutor, StorageError> {
        Ok(self.route(namespace)?.executor.as_ref())
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<Storable>, StorageError> {
        self.executor(namespace)?.select(namespace).await
    }

    pub async fn list_ordered(
        &self,
        namespace: &str,
        order_by: &[OrderByField],
    ) -> Result<Vec<Storable>, StorageError> {
        self.executor(namespace)?
            .select_ordered(namespace, order_by)
            .await
    }

    /// Storables matching every predicate. No predicates lists the namespace.
    pub async fn find(
        &self,
        namespace: &str,
        predicates: Vec<Predicate>,
    ) -> Result<Vec<Storable>, StorageError> {
        if predicates.is_empty() {
            return self.list(namespace).await;
        }
        let query = SearchQuery {
            namespace: namespace.to_string(),
            predicates,
            order_by: Vec::new(),
        };
        self.executor(namespace)?.search(&query).await
    }

    /// The storable at `key`, or `NotFound`.
    pub async fn get(&self, key: &StorableKey) -> Result<Storable, StorageError> {
        self.executor(key.namespace())?
            .select_by_key(key)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// Insert and return the storable with its id when one is observable.
    pub async fn add(&self, storable: Storable) -> Result<Storable, StorageError> {
        self.executor(storable.namespace())?.insert(storable).await
    }

    pub async fn add_or_update(&self, storable: Storable) -> Result<Storable, StorageError> {
        self.executor(storable.namespace())?
            .insert_or_update(storable)
            .await
    }

    /// Delete the storable at `key` and return what was removed, or `NotFound`.
    pub async fn remove(&self, key: &StorableKey) -> Result<Storable, StorageError> {
        let existing = self.get(key).await?;
        self.executor(key.namespace())?.delete(key).await?;
        Ok(existing)
    }

    pub async fn next_id(&self, namespace: &str) -> Result<Option<i64>, StorageError> {
        self.executor(namespace)?.next_id(namespace).await
    }
}

/// Fail with `DuplicateEntity` when another storable shares `fields` with `storable`.
///
/// For domain services; the manager itself never enforces uniqueness.
pub async fn ensure_unique(
    manager: &StorageManager,
    storable: &Storable,
    fields: &[&str],
) -> Result<(), StorageError> {
    if fields.is_empty() {
        return Ok(());
    }
    let predicates = fields
        .iter()
        .map(|f| {
            let value = storable.get(f).cloned().unwrap_or(crate::Value::Null);
            Predicate::Eq((*f).to_string(), value)
        })
        .collect();

    let own_key = storable.storable_key();
    let clash = manager
        .find(storable.namespace(), predicates)
        .await?
        .into_iter()
        .find(|other| other.storable_key() != own_key);

    match clash {
        Some(other) => Err(StorageError::DuplicateEntity(format!(
            "{} conflicts on {}",
            other.storable_key(),
            fields.join(", ")
        ))),
        None => Ok(()),
    }
}
