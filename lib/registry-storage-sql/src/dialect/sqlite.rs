//! SQLite: dynamically typed storage, so integers come back as 64-bit.

use registry_storage::FieldType;

use super::Dialect;
use crate::mapper::Cell;

pub(super) fn upsert_clause(dialect: &Dialect, key_columns: &[&str], update_columns: &[&str]) -> String {
    let keys: Vec<String> = key_columns.iter().map(|c| dialect.quote(c)).collect();
    if update_columns.is_empty() {
        return format!("ON CONFLICT ({}) DO NOTHING", keys.join(", "));
    }

    let sets: Vec<String> = update_columns
        .iter()
        .map(|c| {
            let column = dialect.quote(c);
            format!("{} = excluded.{}", column, column)
        })
        .collect();
    format!(
        "ON CONFLICT ({}) DO UPDATE SET {}",
        keys.join(", "),
        sets.join(", ")
    )
}

/// `GLOB` pattern for a prefix. GLOB is case sensitive, matching `LIKE`
/// on the other engines.
pub(super) fn glob_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        match c {
            '*' => pattern.push_str("[*]"),
            '?' => pattern.push_str("[?]"),
            '[' => pattern.push_str("[[]"),
            c => pattern.push(c),
        }
    }
    pattern.push('*');
    pattern
}

pub(super) fn normalize(cell: Cell, field_type: FieldType) -> Cell {
    match (cell, field_type) {
        (Cell::BigInt(v), FieldType::Boolean) => Cell::Bool(v != 0),
        (Cell::Integer(v), FieldType::Boolean) => Cell::Bool(v != 0),
        (Cell::BigInt(v), FieldType::Integer) => match i32::try_from(v) {
            Ok(narrow) => Cell::Integer(narrow),
            Err(_) => Cell::BigInt(v),
        },
        (Cell::Integer(v), FieldType::Long) => Cell::BigInt(i64::from(v)),
        (Cell::Real(v), FieldType::Double) => Cell::Double(f64::from(v)),
        (cell, _) => cell,
    }
}
