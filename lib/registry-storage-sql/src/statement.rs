//! Logical statement shapes, their bind values, and compiled SQL.
//!
//! A [`StatementKey`] describes a statement without its values: two
//! operations with equal keys render to identical SQL with the same
//! number of parameters. Values travel separately in a [`Plan`] and are
//! never stored in the statement cache.

use std::sync::Arc;

use registry_storage::{FieldType, OrderByField, Value};

/// Comparison shape of one predicate, without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    StartsWith,
    /// IN with this many operands; 0 never matches.
    In(usize),
    /// IN over this many non-null operands, or NULL.
    InOrNull(usize),
    IsNull,
    IsNotNull,
}

impl Op {
    /// Number of bind parameters this predicate consumes.
    pub fn arity(&self) -> usize {
        match self {
            Op::IsNull | Op::IsNotNull => 0,
            Op::Between => 2,
            Op::In(n) | Op::InOrNull(n) => *n,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    pub column: String,
    pub op: Op,
}

/// Identity of a compiled statement; the statement cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatementKey {
    Insert {
        table: String,
        columns: Vec<String>,
        /// Generated-key column to read back, when the id is left to the engine.
        returning: Option<String>,
    },
    Upsert {
        table: String,
        columns: Vec<String>,
        key_columns: Vec<String>,
        returning: Option<String>,
    },
    Update {
        table: String,
        columns: Vec<String>,
        key_columns: Vec<String>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        conditions: Vec<Condition>,
        order_by: Vec<OrderByField>,
    },
    Delete {
        table: String,
        conditions: Vec<Condition>,
    },
}

impl StatementKey {
    pub fn table(&self) -> &str {
        match self {
            StatementKey::Insert { table, .. }
            | StatementKey::Upsert { table, .. }
            | StatementKey::Update { table, .. }
            | StatementKey::Select { table, .. }
            | StatementKey::Delete { table, .. } => table,
        }
    }

    pub fn returning(&self) -> Option<&str> {
        match self {
            StatementKey::Insert { returning, .. } | StatementKey::Upsert { returning, .. } => {
                returning.as_deref()
            }
            _ => None,
        }
    }

    /// Number of bind parameters the rendered statement takes.
    pub fn param_count(&self) -> usize {
        match self {
            StatementKey::Insert { columns, .. } | StatementKey::Upsert { columns, .. } => {
                columns.len()
            }
            StatementKey::Update {
                columns,
                key_columns,
                ..
            } => columns.len() + key_columns.len(),
            StatementKey::Select { conditions, .. } | StatementKey::Delete { conditions, .. } => {
                conditions.iter().map(|c| c.op.arity()).sum()
            }
        }
    }
}

/// One bind value with the declared type of the column it targets.
///
/// The type picks how a null is bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub value: Value,
    pub field_type: FieldType,
}

impl Param {
    pub fn new(value: Value, field_type: FieldType) -> Self {
        Self { value, field_type }
    }
}

/// A statement shape plus the values of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub key: StatementKey,
    pub params: Vec<Param>,
}

/// Rendered SQL for a statement shape. Shared through the statement cache.
#[derive(Debug, PartialEq, Eq)]
pub struct PreparedSql {
    pub key: StatementKey,
    pub sql: String,
}

/// SQL text plus the ordered bind values for one invocation.
#[derive(Debug, Clone)]
pub struct CompiledStatement {
    pub prepared: Arc<PreparedSql>,
    pub params: Vec<Param>,
}

impl CompiledStatement {
    pub fn sql(&self) -> &str {
        &self.prepared.sql
    }

    pub fn key(&self) -> &StatementKey {
        &self.prepared.key
    }
}
