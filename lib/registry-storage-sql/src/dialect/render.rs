//! SQL text for statement keys.

use registry_storage::OrderByField;

use super::{Dialect, KeyRetrieval, mysql, postgres, sqlite};
use crate::statement::{Condition, Op, StatementKey};

/// Hands out placeholders in bind order.
struct Placeholders<'d> {
    dialect: &'d Dialect,
    next: usize,
}

impl Placeholders<'_> {
    fn next(&mut self) -> String {
        let p = self.dialect.placeholder(self.next);
        self.next += 1;
        p
    }
}

impl Dialect {
    /// Render a statement key to SQL. Placeholders are numbered in the
    /// order the plan's parameters are bound.
    pub fn render(&self, key: &StatementKey) -> String {
        let mut params = Placeholders {
            dialect: self,
            next: 1,
        };

        match key {
            StatementKey::Insert {
                table,
                columns,
                returning,
            } => {
                let mut sql = self.insert_prefix(table, columns, &mut params);
                sql.push_str(&self.returning_clause(returning.as_deref()));
                sql
            }
            StatementKey::Upsert {
                table,
                columns,
                key_columns,
                returning,
            } => {
                let mut sql = self.insert_prefix(table, columns, &mut params);
                // nothing supplied means nothing can conflict
                if !columns.is_empty() {
                    let update_columns: Vec<&str> = columns
                        .iter()
                        .filter(|c| !key_columns.contains(c))
                        .map(String::as_str)
                        .collect();
                    let keys: Vec<&str> = key_columns.iter().map(String::as_str).collect();
                    sql.push(' ');
                    sql.push_str(&self.upsert_clause(&keys, &update_columns));
                }
                sql.push_str(&self.returning_clause(returning.as_deref()));
                sql
            }
            StatementKey::Update {
                table,
                columns,
                key_columns,
            } => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} = {}", self.quote(c), params.next()))
                    .collect();
                let wheres: Vec<String> = key_columns
                    .iter()
                    .map(|c| format!("{} = {}", self.quote(c), params.next()))
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {}",
                    self.quote(table),
                    sets.join(", "),
                    wheres.join(" AND ")
                )
            }
            StatementKey::Select {
                table,
                columns,
                conditions,
                order_by,
            } => {
                let cols: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
                format!(
                    "SELECT {} FROM {}{}{}",
                    cols.join(", "),
                    self.quote(table),
                    self.where_clause(conditions, &mut params),
                    self.order_clause(order_by)
                )
            }
            StatementKey::Delete { table, conditions } => format!(
                "DELETE FROM {}{}",
                self.quote(table),
                self.where_clause(conditions, &mut params)
            ),
        }
    }

    fn insert_prefix(&self, table: &str, columns: &[String], params: &mut Placeholders) -> String {
        if columns.is_empty() {
            return match self {
                Dialect::MySql => format!("INSERT INTO {} () VALUES ()", self.quote(table)),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("INSERT INTO {} DEFAULT VALUES", self.quote(table))
                }
            };
        }

        let cols: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
        let placeholders: Vec<String> = columns.iter().map(|_| params.next()).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote(table),
            cols.join(", "),
            placeholders.join(", ")
        )
    }

    fn returning_clause(&self, returning: Option<&str>) -> String {
        match (returning, self.key_retrieval()) {
            (Some(column), KeyRetrieval::Returning) => format!(" RETURNING {}", self.quote(column)),
            _ => String::new(),
        }
    }

    fn upsert_clause(&self, key_columns: &[&str], update_columns: &[&str]) -> String {
        match self {
            Dialect::Postgres => postgres::upsert_clause(self, key_columns, update_columns),
            Dialect::MySql => mysql::upsert_clause(self, key_columns, update_columns),
            Dialect::Sqlite => sqlite::upsert_clause(self, key_columns, update_columns),
        }
    }

    fn where_clause(&self, conditions: &[Condition], params: &mut Placeholders) -> String {
        if conditions.is_empty() {
            return String::new();
        }

        let clauses: Vec<String> = conditions
            .iter()
            .map(|c| self.condition(c, params))
            .collect();
        format!(" WHERE {}", clauses.join(" AND "))
    }

    fn condition(&self, condition: &Condition, params: &mut Placeholders) -> String {
        let column = self.quote(&condition.column);
        match condition.op {
            Op::Eq => format!("{} = {}", column, params.next()),
            Op::Ne => format!("{} <> {}", column, params.next()),
            Op::Gt => format!("{} > {}", column, params.next()),
            Op::Gte => format!("{} >= {}", column, params.next()),
            Op::Lt => format!("{} < {}", column, params.next()),
            Op::Lte => format!("{} <= {}", column, params.next()),
            Op::Between => {
                let low = params.next();
                let high = params.next();
                format!("{} BETWEEN {} AND {}", column, low, high)
            }
            Op::StartsWith => match self {
                Dialect::Sqlite => format!("{} GLOB {}", column, params.next()),
                Dialect::Postgres | Dialect::MySql => {
                    format!("{} LIKE {} ESCAPE '!'", column, params.next())
                }
            },
            Op::In(0) => "1 = 0".to_string(),
            Op::In(n) => {
                let list: Vec<String> = (0..n).map(|_| params.next()).collect();
                format!("{} IN ({})", column, list.join(", "))
            }
            Op::InOrNull(0) => format!("{} IS NULL", column),
            Op::InOrNull(n) => {
                let list: Vec<String> = (0..n).map(|_| params.next()).collect();
                format!("({} IN ({}) OR {} IS NULL)", column, list.join(", "), column)
            }
            Op::IsNull => format!("{} IS NULL", column),
            Op::IsNotNull => format!("{} IS NOT NULL", column),
        }
    }

    fn order_clause(&self, order_by: &[OrderByField]) -> String {
        if order_by.is_empty() {
            return String::new();
        }

        let clauses: Vec<String> = order_by
            .iter()
            .map(|order| {
                let dir = if order.descending { "DESC" } else { "ASC" };
                format!("{} {}", self.quote(&order.field), dir)
            })
            .collect();

        format!(" ORDER BY {}", clauses.join(", "))
    }
}
