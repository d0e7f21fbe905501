//! Bounded LRU cache of rendered statements.
//!
//! Keyed by [`StatementKey`], which carries no bind values, so entries
//! are shared by every invocation with the same shape.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::dialect::Dialect;
use crate::statement::{CompiledStatement, Plan, PreparedSql, StatementKey};

/// Called with each entry dropped to make room for a new one.
pub type EvictionHook = Arc<dyn Fn(&StatementKey, &PreparedSql) + Send + Sync>;

/// Outcome of one cache lookup.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub prepared: Arc<PreparedSql>,
    pub hit: bool,
    pub evicted: Option<Arc<PreparedSql>>,
}

/// Rendered statements keyed by shape, bounded to the pool size.
///
/// An entry is the SQL text of one shape, not a driver handle. sqlx keeps
/// its own prepared statements per connection and reuses them by SQL
/// text, so an evicted shape stops being issued from here and its handle
/// ages out of the driver's cache. The eviction hook receives the entry
/// so callers can release anything they attached to it.
pub struct StatementCache {
    entries: Mutex<LruCache<StatementKey, Arc<PreparedSql>>>,
    on_evict: Option<EvictionHook>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

impl StatementCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            on_evict: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_eviction_hook(mut self, hook: EvictionHook) -> Self {
        self.on_evict = Some(hook);
        self
    }

    pub fn set_eviction_hook(&mut self, hook: EvictionHook) {
        self.on_evict = Some(hook);
    }

    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: entries.len(),
            capacity: entries.cap().get(),
        }
    }

    /// Return the cached statement for `key`, rendering and inserting it
    /// on a miss. At capacity the least recently used entry is evicted.
    pub fn get_or_prepare(
        &self,
        key: StatementKey,
        render: impl FnOnce(&StatementKey) -> String,
    ) -> Lookup {
        let (lookup, evicted_key) = {
            let mut entries = self.entries.lock();
            if let Some(prepared) = entries.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Lookup {
                    prepared: prepared.clone(),
                    hit: true,
                    evicted: None,
                };
            }

            self.misses.fetch_add(1, Ordering::Relaxed);
            let sql = render(&key);
            let prepared = Arc::new(PreparedSql {
                key: key.clone(),
                sql,
            });
            // the key was absent, so anything pushed out is an eviction
            let evicted = entries.push(key, prepared.clone());
            let evicted_key = evicted.as_ref().map(|(k, _)| k.clone());
            (
                Lookup {
                    prepared,
                    hit: false,
                    evicted: evicted.map(|(_, v)| v),
                },
                evicted_key,
            )
        };

        // hook runs outside the lock so it may inspect the cache
        if let (Some(hook), Some(key), Some(prepared)) =
            (&self.on_evict, evicted_key, lookup.evicted.as_ref())
        {
            hook(&key, prepared);
        }

        lookup
    }

    /// Compile `plan` through the cache.
    pub fn compile(&self, plan: Plan, dialect: &Dialect) -> (CompiledStatement, Lookup) {
        let lookup = self.get_or_prepare(plan.key, |key| dialect.render(key));
        let compiled = CompiledStatement {
            prepared: lookup.prepared.clone(),
            params: plan.params,
        };
        (compiled, lookup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SelectTarget;
    use registry_storage::{FieldType, OrderByField, Schema, SearchQuery, StorableKey};
    use std::sync::atomic::AtomicUsize;

    fn models() -> Schema {
        Schema::builder("models")
            .field("id", FieldType::Long)
            .field("name", FieldType::String)
            .field("version", FieldType::Integer)
            .primary_key(["id"])
            .build()
            .unwrap()
    }

    fn select_on(field: &str) -> Plan {
        let query = SearchQuery::new("models").eq(field, 1);
        Dialect::Postgres
            .plan_select(&models(), SelectTarget::Search(&query), &[])
            .unwrap()
    }

    #[test]
    fn cache_is_bounded_and_reports_evictions() {
        let evictions = Arc::new(AtomicUsize::new(0));
        let counter = evictions.clone();
        let cache = StatementCache::new(NonZeroUsize::new(2).unwrap()).with_eviction_hook(
            Arc::new(move |_key: &StatementKey, _sql: &PreparedSql| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let schema = models();
        let shapes = vec![
            select_on("id"),
            select_on("version"),
            Dialect::Postgres
                .plan_select(&schema, SelectTarget::Namespace, &[])
                .unwrap(),
            Dialect::Postgres
                .plan_delete(&schema, &StorableKey::new("models").with("id", 1i64))
                .unwrap(),
            Dialect::Postgres
                .plan_select(&schema, SelectTarget::Namespace, &[OrderByField::asc("name")])
                .unwrap(),
        ];
        for plan in shapes {
            cache.compile(plan, &Dialect::Postgres);
            assert!(cache.len() <= 2);
        }

        assert_eq!(evictions.load(Ordering::SeqCst), 3);
        assert_eq!(cache.stats().misses, 5);
    }

    #[test]
    fn eviction_hook_receives_the_least_recently_used_entry() {
        let evicted = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = evicted.clone();
        let cache = StatementCache::new(NonZeroUsize::new(2).unwrap()).with_eviction_hook(
            Arc::new(move |key: &StatementKey, sql: &PreparedSql| {
                sink.lock().push((key.clone(), sql.sql.clone()));
            }),
        );

        let (by_id, _) = cache.compile(select_on("id"), &Dialect::Postgres);
        let (by_version, _) = cache.compile(select_on("version"), &Dialect::Postgres);
        // touch the first shape so the second becomes least recently used
        assert!(cache.compile(select_on("id"), &Dialect::Postgres).1.hit);

        let list = Dialect::Postgres
            .plan_select(&models(), SelectTarget::Namespace, &[])
            .unwrap();
        let (_, lookup) = cache.compile(list, &Dialect::Postgres);
        let dropped = lookup.evicted.unwrap();
        assert!(Arc::ptr_eq(&dropped, &by_version.prepared));

        let seen = evicted.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(&seen[0].0, by_version.key());
        assert_eq!(seen[0].1, by_version.sql());
        assert_ne!(seen[0].1, by_id.sql());
    }

    #[test]
    fn repeated_shape_hits_the_same_entry() {
        let cache = StatementCache::new(NonZeroUsize::new(4).unwrap());
        let (first, lookup) = cache.compile(select_on("id"), &Dialect::Postgres);
        assert!(!lookup.hit);

        let other_value = {
            let query = SearchQuery::new("models").eq("id", 99);
            Dialect::Postgres
                .plan_select(&models(), SelectTarget::Search(&query), &[])
                .unwrap()
        };
        let (second, lookup) = cache.compile(other_value, &Dialect::Postgres);
        assert!(lookup.hit);
        assert!(Arc::ptr_eq(&first.prepared, &second.prepared));
        assert_eq!(first.sql(), second.sql());
        assert_ne!(first.params, second.params);
        assert_eq!(cache.len(), 1);
    }
}
