//! SQL dialects.
//!
//! Each dialect turns logical operations into engine-specific SQL.
//! Planning validates the operation against the namespace's schema and
//! collects bind values; rendering turns the value-free
//! [`StatementKey`] into SQL text. Both are pure, so equal keys always
//! render to identical SQL.

mod mysql;
mod postgres;
mod render;
mod sqlite;

use std::sync::Arc;

use registry_storage::{
    FieldType, OrderByField, Predicate, Schema, SearchQuery, Storable, StorableKey, StorageError,
    Value,
};
use serde::{Deserialize, Serialize};

use crate::mapper::RawRow;
use crate::statement::{CompiledStatement, Condition, Op, Param, Plan, PreparedSql, StatementKey};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

/// How an engine reports the id it generated on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRetrieval {
    /// `INSERT .. RETURNING <id>` yields a row holding the new id.
    Returning,
    /// The driver reports the last auto-increment value on the result.
    LastInsertId,
}

/// Rows a select addresses.
#[derive(Debug, Clone, Copy)]
pub enum SelectTarget<'a> {
    Namespace,
    Key(&'a StorableKey),
    Search(&'a SearchQuery),
}

impl Dialect {
    /// Pick the dialect from a data-source implementation identifier
    /// such as `org.postgresql.ds.PGSimpleDataSource`.
    pub fn from_data_source(id: &str) -> Result<Self, StorageError> {
        let id = id.to_ascii_lowercase();
        if id.contains("postgres") || id.contains("pgsimple") {
            Ok(Dialect::Postgres)
        } else if id.contains("mysql") || id.contains("mariadb") {
            Ok(Dialect::MySql)
        } else if id.contains("sqlite") {
            Ok(Dialect::Sqlite)
        } else {
            Err(StorageError::InvalidConfig(format!(
                "unsupported data source: {}",
                id
            )))
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub fn key_retrieval(&self) -> KeyRetrieval {
        match self {
            Dialect::Postgres | Dialect::Sqlite => KeyRetrieval::Returning,
            Dialect::MySql => KeyRetrieval::LastInsertId,
        }
    }

    pub(crate) fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => quote_double(ident),
            Dialect::MySql => mysql::quote(ident),
        }
    }

    /// Placeholder for the 1-based parameter `index`.
    pub(crate) fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => postgres::placeholder(index),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Bind value for a prefix match on `prefix`.
    fn prefix_pattern(&self, prefix: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::MySql => like_prefix(prefix),
            Dialect::Sqlite => sqlite::glob_prefix(prefix),
        }
    }

    /// Apply this engine's type coercions to a raw result row.
    ///
    /// Only width and representation changes happen here (e.g. a 32-bit
    /// SERIAL id widened to the 64-bit id type); values are never
    /// reinterpreted.
    pub fn normalize_row(&self, row: &mut RawRow, schema: &Schema) {
        match self {
            Dialect::Postgres => row.map_cells(schema, postgres::normalize),
            Dialect::MySql => row.map_cells(schema, mysql::normalize),
            Dialect::Sqlite => row.map_cells(schema, sqlite::normalize),
        }
    }

    // ============= Planning =============

    /// Plan an insert. An absent identity is left out of the column list
    /// so the engine's own sequence fills it.
    pub fn plan_insert(&self, schema: &Schema, storable: &Storable) -> Result<Plan, StorageError> {
        let (columns, params, returning) = write_columns(schema, storable)?;
        Ok(Plan {
            key: StatementKey::Insert {
                table: schema.namespace().to_string(),
                columns,
                returning,
            },
            params,
        })
    }

    /// Plan an insert-or-update keyed on the primary key.
    pub fn plan_upsert(&self, schema: &Schema, storable: &Storable) -> Result<Plan, StorageError> {
        let (columns, params, returning) = write_columns(schema, storable)?;
        Ok(Plan {
            key: StatementKey::Upsert {
                table: schema.namespace().to_string(),
                columns,
                key_columns: schema.primary_key().to_vec(),
                returning,
            },
            params,
        })
    }

    /// Plan an update of the row with the storable's primary key.
    ///
    /// `None` when the key is incomplete or there is nothing to set.
    pub fn plan_update(
        &self,
        schema: &Schema,
        storable: &Storable,
    ) -> Result<Option<Plan>, StorageError> {
        check_storable(schema, storable)?;

        let mut columns = Vec::new();
        let mut params = Vec::new();
        for field in schema.fields() {
            if schema.is_key(&field.name) {
                continue;
            }
            if let Some(value) = storable.get(&field.name) {
                columns.push(field.name.clone());
                params.push(Param::new(
                    value.clone().coerce(&field.name, field.field_type)?,
                    field.field_type,
                ));
            }
        }

        let mut key_columns = Vec::new();
        for key in schema.primary_key() {
            match storable.get(key) {
                Some(value) if !value.is_null() => {
                    let field_type = schema.require(key)?;
                    key_columns.push(key.clone());
                    params.push(Param::new(value.clone().coerce(key, field_type)?, field_type));
                }
                _ => return Ok(None),
            }
        }

        if columns.is_empty() {
            return Ok(None);
        }

        Ok(Some(Plan {
            key: StatementKey::Update {
                table: schema.namespace().to_string(),
                columns,
                key_columns,
            },
            params,
        }))
    }

    pub fn plan_select(
        &self,
        schema: &Schema,
        target: SelectTarget<'_>,
        order_by: &[OrderByField],
    ) -> Result<Plan, StorageError> {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        match target {
            SelectTarget::Namespace => {}
            SelectTarget::Key(key) => {
                check_namespace(schema, key.namespace())?;
                key_conditions(schema, key, &mut conditions, &mut params)?;
            }
            SelectTarget::Search(query) => {
                check_namespace(schema, &query.namespace)?;
                for predicate in &query.predicates {
                    self.plan_predicate(schema, predicate, &mut conditions, &mut params)?;
                }
            }
        }

        for order in order_by {
            schema.require(&order.field)?;
        }

        Ok(Plan {
            key: StatementKey::Select {
                table: schema.namespace().to_string(),
                columns: schema.fields().iter().map(|f| f.name.clone()).collect(),
                conditions,
                order_by: order_by.to_vec(),
            },
            params,
        })
    }

    pub fn plan_delete(&self, schema: &Schema, key: &StorableKey) -> Result<Plan, StorageError> {
        check_namespace(schema, key.namespace())?;
        let mut conditions = Vec::new();
        let mut params = Vec::new();
        key_conditions(schema, key, &mut conditions, &mut params)?;

        Ok(Plan {
            key: StatementKey::Delete {
                table: schema.namespace().to_string(),
                conditions,
            },
            params,
        })
    }

    fn plan_predicate(
        &self,
        schema: &Schema,
        predicate: &Predicate,
        conditions: &mut Vec<Condition>,
        params: &mut Vec<Param>,
    ) -> Result<(), StorageError> {
        let column = predicate.field();
        let field_type = schema.require(column)?;
        let mut bind = |value: &Value| -> Result<(), StorageError> {
            params.push(Param::new(value.clone().coerce(column, field_type)?, field_type));
            Ok(())
        };

        let op = match predicate {
            Predicate::Eq(_, Value::Null) => Op::IsNull,
            Predicate::Ne(_, Value::Null) => Op::IsNotNull,
            Predicate::Eq(_, v) => {
                bind(v)?;
                Op::Eq
            }
            Predicate::Ne(_, v) => {
                bind(v)?;
                Op::Ne
            }
            Predicate::Gt(_, v) => {
                bind(v)?;
                Op::Gt
            }
            Predicate::Gte(_, v) => {
                bind(v)?;
                Op::Gte
            }
            Predicate::Lt(_, v) => {
                bind(v)?;
                Op::Lt
            }
            Predicate::Lte(_, v) => {
                bind(v)?;
                Op::Lte
            }
            Predicate::Between(_, low, high) => {
                bind(low)?;
                bind(high)?;
                Op::Between
            }
            Predicate::StartsWith(_, prefix) => {
                if field_type != FieldType::String {
                    return Err(StorageError::SchemaMismatch(format!(
                        "prefix match on '{}' needs a string field, declared {}",
                        column, field_type
                    )));
                }
                bind(&Value::String(self.prefix_pattern(prefix)))?;
                Op::StartsWith
            }
            Predicate::In(_, values) => {
                let mut bound = 0;
                for v in values.iter().filter(|v| !v.is_null()) {
                    bind(v)?;
                    bound += 1;
                }
                if bound < values.len() {
                    Op::InOrNull(bound)
                } else {
                    Op::In(bound)
                }
            }
            Predicate::IsNull(_) => Op::IsNull,
            Predicate::IsNotNull(_) => Op::IsNotNull,
        };

        conditions.push(Condition {
            column: column.to_string(),
            op,
        });
        Ok(())
    }

    // ============= Compilation =============

    /// Render a plan into SQL, bypassing any cache.
    pub fn compile(&self, plan: Plan) -> CompiledStatement {
        let sql = self.render(&plan.key);
        CompiledStatement {
            prepared: Arc::new(PreparedSql { key: plan.key, sql }),
            params: plan.params,
        }
    }

    pub fn compile_insert(
        &self,
        schema: &Schema,
        storable: &Storable,
    ) -> Result<CompiledStatement, StorageError> {
        Ok(self.compile(self.plan_insert(schema, storable)?))
    }

    pub fn compile_upsert(
        &self,
        schema: &Schema,
        storable: &Storable,
    ) -> Result<CompiledStatement, StorageError> {
        Ok(self.compile(self.plan_upsert(schema, storable)?))
    }

    pub fn compile_select(
        &self,
        schema: &Schema,
        target: SelectTarget<'_>,
        order_by: &[OrderByField],
    ) -> Result<CompiledStatement, StorageError> {
        Ok(self.compile(self.plan_select(schema, target, order_by)?))
    }

    pub fn compile_delete(
        &self,
        schema: &Schema,
        key: &StorableKey,
    ) -> Result<CompiledStatement, StorageError> {
        Ok(self.compile(self.plan_delete(schema, key)?))
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn check_namespace(schema: &Schema, namespace: &str) -> Result<(), StorageError> {
    if schema.namespace() != namespace {
        return Err(StorageError::SchemaMismatch(format!(
            "namespace '{}' does not match schema '{}'",
            namespace,
            schema.namespace()
        )));
    }
    Ok(())
}

fn check_storable(schema: &Schema, storable: &Storable) -> Result<(), StorageError> {
    check_namespace(schema, storable.namespace())?;
    for name in storable.fields().keys() {
        schema.require(name)?;
    }
    Ok(())
}

/// Columns and values written by insert and upsert, in schema order.
///
/// Fields the storable does not carry are left to column defaults. An
/// absent identity is omitted and reported as the column to read back.
fn write_columns(
    schema: &Schema,
    storable: &Storable,
) -> Result<(Vec<String>, Vec<Param>, Option<String>), StorageError> {
    check_storable(schema, storable)?;

    let returning = schema
        .id_field()
        .filter(|id| storable.get(id).is_none_or(Value::is_null))
        .map(str::to_string);

    let mut columns = Vec::new();
    let mut params = Vec::new();
    for field in schema.fields() {
        if returning.as_deref() == Some(field.name.as_str()) {
            continue;
        }
        if let Some(value) = storable.get(&field.name) {
            columns.push(field.name.clone());
            params.push(Param::new(
                value.clone().coerce(&field.name, field.field_type)?,
                field.field_type,
            ));
        }
    }

    Ok((columns, params, returning))
}

/// Equality conditions for a key, in primary-key order.
///
/// The key must name every primary-key field and nothing else, so it
/// addresses at most one row.
fn key_conditions(
    schema: &Schema,
    key: &StorableKey,
    conditions: &mut Vec<Condition>,
    params: &mut Vec<Param>,
) -> Result<(), StorageError> {
    for name in key.fields().keys() {
        schema.require(name)?;
        if !schema.is_key(name) {
            return Err(StorageError::SchemaMismatch(format!(
                "'{}' is not a primary key field of '{}'",
                name,
                schema.namespace()
            )));
        }
    }

    for name in schema.primary_key() {
        let Some(value) = key.fields().get(name) else {
            return Err(StorageError::SchemaMismatch(format!(
                "key for '{}' is missing primary key field '{}'",
                schema.namespace(),
                name
            )));
        };
        let field_type = schema.require(name)?;
        let op = if value.is_null() {
            Op::IsNull
        } else {
            params.push(Param::new(value.clone().coerce(name, field_type)?, field_type));
            Op::Eq
        };
        conditions.push(Condition {
            column: name.clone(),
            op,
        });
    }
    Ok(())
}

fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `LIKE` pattern for a prefix, escaping with `!`.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '!' | '%' | '_') {
            pattern.push('!');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
