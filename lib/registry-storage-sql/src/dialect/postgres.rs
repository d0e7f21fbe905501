//! PostgreSQL: numbered placeholders, `ON CONFLICT` upserts, `RETURNING` ids.

use registry_storage::FieldType;

use super::Dialect;
use crate::mapper::Cell;

pub(super) fn placeholder(index: usize) -> String {
    format!("${}", index)
}

pub(super) fn upsert_clause(dialect: &Dialect, key_columns: &[&str], update_columns: &[&str]) -> String {
    let keys: Vec<String> = key_columns.iter().map(|c| dialect.quote(c)).collect();
    if update_columns.is_empty() {
        return format!("ON CONFLICT ({}) DO NOTHING", keys.join(", "));
    }

    let sets: Vec<String> = update_columns
        .iter()
        .map(|c| {
            let column = dialect.quote(c);
            format!("{} = EXCLUDED.{}", column, column)
        })
        .collect();
    format!(
        "ON CONFLICT ({}) DO UPDATE SET {}",
        keys.join(", "),
        sets.join(", ")
    )
}

/// SERIAL and SMALLINT columns come back narrower than the declared type.
pub(super) fn normalize(cell: Cell, field_type: FieldType) -> Cell {
    match (cell, field_type) {
        (Cell::SmallInt(v), FieldType::Long) => Cell::BigInt(i64::from(v)),
        (Cell::Integer(v), FieldType::Long) => Cell::BigInt(i64::from(v)),
        (Cell::SmallInt(v), FieldType::Integer) => Cell::Integer(i32::from(v)),
        (Cell::Real(v), FieldType::Double) => Cell::Double(f64::from(v)),
        (cell, _) => cell,
    }
}
