//! Result rows to storables.
//!
//! Rows are read into engine-neutral [`Cell`]s first so each dialect can
//! normalize representation differences before the strict conversion to
//! schema-typed [`Value`]s.

use registry_storage::{FieldType, Schema, Storable, StorageError, Value};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// One raw column value as the driver produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "boolean",
            Cell::SmallInt(_) => "smallint",
            Cell::Integer(_) => "integer",
            Cell::BigInt(_) => "bigint",
            Cell::Real(_) => "real",
            Cell::Double(_) => "double",
            Cell::Text(_) => "text",
            Cell::Blob(_) => "blob",
        }
    }
}

/// A result row keyed by column name, in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub cells: Vec<(String, Cell)>,
}

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    /// Rewrite every non-null cell of a declared field with `f`.
    pub fn map_cells(&mut self, schema: &Schema, f: impl Fn(Cell, FieldType) -> Cell) {
        for (name, cell) in &mut self.cells {
            let Some(field_type) = schema.field_type(name) else {
                continue;
            };
            if *cell == Cell::Null {
                continue;
            }
            let taken = std::mem::replace(cell, Cell::Null);
            *cell = f(taken, field_type);
        }
    }
}

/// Read every column of a row without interpreting it against a schema.
pub fn read_row(row: &AnyRow) -> Result<RawRow, StorageError> {
    let mut cells = Vec::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        cells.push((column.name().to_string(), read_cell(row, idx)?));
    }
    Ok(RawRow { cells })
}

fn read_cell(row: &AnyRow, idx: usize) -> Result<Cell, StorageError> {
    let raw = row
        .try_get_raw(idx)
        .map_err(|e| StorageError::execution(e.to_string()))?;
    if raw.is_null() {
        return Ok(Cell::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let cell = match type_name.as_str() {
        "BOOLEAN" => decode(row, idx)?.map(Cell::Bool),
        "SMALLINT" => decode(row, idx)?.map(Cell::SmallInt),
        "INTEGER" => decode(row, idx)?.map(Cell::Integer),
        "BIGINT" => decode(row, idx)?.map(Cell::BigInt),
        "REAL" => decode(row, idx)?.map(Cell::Real),
        "DOUBLE" => decode(row, idx)?.map(Cell::Double),
        "BLOB" => decode(row, idx)?.map(Cell::Blob),
        // TEXT and anything the driver reports as text
        _ => decode(row, idx)?.map(Cell::Text),
    };

    Ok(cell.unwrap_or(Cell::Null))
}

fn decode<'r, T>(row: &'r AnyRow, idx: usize) -> Result<Option<T>, StorageError>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| StorageError::execution(e.to_string()))
}

/// Convert a normalized row to a storable of `schema`.
///
/// Null columns are left out of the storable. A column the schema does
/// not declare, or a cell whose kind does not match the declared type,
/// is a `SchemaMismatch`.
pub fn to_storable(raw: RawRow, schema: &Schema) -> Result<Storable, StorageError> {
    let fields = raw
        .cells
        .into_iter()
        .filter(|(_, cell)| *cell != Cell::Null)
        .map(|(name, cell)| {
            let field_type = schema.require(&name)?;
            let value = to_value(&name, cell, field_type)?;
            Ok((name, value))
        })
        .collect::<Result<_, StorageError>>()?;
    Ok(Storable::from_parts(
        schema.namespace(),
        schema.primary_key().to_vec(),
        fields,
    ))
}

fn to_value(name: &str, cell: Cell, field_type: FieldType) -> Result<Value, StorageError> {
    match (cell, field_type) {
        (Cell::Bool(v), FieldType::Boolean) => Ok(Value::Bool(v)),
        (Cell::Integer(v), FieldType::Integer) => Ok(Value::Int(v)),
        (Cell::BigInt(v), FieldType::Long) => Ok(Value::Long(v)),
        (Cell::Double(v), FieldType::Double) => Ok(Value::Double(v)),
        (Cell::Text(v), FieldType::String) => Ok(Value::String(v)),
        (cell, field_type) => Err(StorageError::SchemaMismatch(format!(
            "column '{}' is declared {} but the database returned {}",
            name,
            field_type,
            cell.kind()
        ))),
    }
}
