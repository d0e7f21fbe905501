//! Registry Storage - core types for dialect-pluggable persistence of storables.
//!
//! Application code works with generic [`Storable`]s described by a
//! [`Schema`] and addressed by namespace plus primary key. Backends
//! implement [`StorageExecutor`] for one database dialect each, and the
//! [`StorageManager`] facade routes every call to the executor serving
//! the storable's namespace.
//!
//! # Core Concepts
//!
//! - **Namespace**: the table/collection grouping storables of one type.
//! - **Identity field**: a single-column integer primary key, which the
//!   database may fill in on insert.
//! - **Id pre-allocation**: dialects without server-side generation draw
//!   ids from an [`IdSequence`] before inserting.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod error;
mod executor;
mod manager;
mod query;
mod schema;
mod storable;
mod value;

pub use error::{ExecutionKind, StorageError};
pub use executor::{IdSequence, MemoryIdSequence, StorageExecutor};
pub use manager::{StorageManager, ensure_unique};
pub use query::{OrderByField, Predicate, SearchQuery};
pub use schema::{Field, Schema, SchemaBuilder};
pub use storable::{Storable, StorableKey};
pub use value::{FieldType, Value};
