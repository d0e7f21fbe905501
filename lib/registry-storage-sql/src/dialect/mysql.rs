//! MySQL and MariaDB: backtick identifiers, `ON DUPLICATE KEY` upserts.

use registry_storage::FieldType;

use super::Dialect;
use crate::mapper::Cell;

pub(super) fn quote(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

pub(super) fn upsert_clause(dialect: &Dialect, key_columns: &[&str], update_columns: &[&str]) -> String {
    if update_columns.is_empty() {
        // a self-assignment turns the duplicate into a no-op
        let key = key_columns.first().map(|c| dialect.quote(c)).unwrap_or_default();
        return format!("ON DUPLICATE KEY UPDATE {} = {}", key, key);
    }

    let sets: Vec<String> = update_columns
        .iter()
        .map(|c| {
            let column = dialect.quote(c);
            format!("{} = VALUES({})", column, column)
        })
        .collect();
    format!("ON DUPLICATE KEY UPDATE {}", sets.join(", "))
}

/// BOOLEAN is TINYINT(1) on the wire; INT ids may back a Long field.
pub(super) fn normalize(cell: Cell, field_type: FieldType) -> Cell {
    match (cell, field_type) {
        (Cell::SmallInt(v), FieldType::Boolean) => Cell::Bool(v != 0),
        (Cell::Integer(v), FieldType::Boolean) => Cell::Bool(v != 0),
        (Cell::BigInt(v), FieldType::Boolean) => Cell::Bool(v != 0),
        (Cell::SmallInt(v), FieldType::Long) => Cell::BigInt(i64::from(v)),
        (Cell::Integer(v), FieldType::Long) => Cell::BigInt(i64::from(v)),
        (Cell::SmallInt(v), FieldType::Integer) => Cell::Integer(i32::from(v)),
        (Cell::Real(v), FieldType::Double) => Cell::Double(f64::from(v)),
        (cell, _) => cell,
    }
}
