//! Field values and the field types a schema can declare.

use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Declared type of a storable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Boolean,
    /// 32-bit signed integer.
    Integer,
    /// 64-bit signed integer; the canonical identity type.
    Long,
    Double,
    String,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::String => "string",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A value held by a storable field or bound to a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer content widened to 64 bits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
        }
    }

    /// Coerce the value to `field_type`.
    ///
    /// Null fits every type. `Int` widens to `Long`; `Long` narrows to
    /// `Int` only when it fits in 32 bits. Everything else must already
    /// match.
    pub fn coerce(self, field: &str, field_type: FieldType) -> Result<Value, StorageError> {
        match (self, field_type) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Bool(b), FieldType::Boolean) => Ok(Value::Bool(b)),
            (Value::Int(n), FieldType::Integer) => Ok(Value::Int(n)),
            (Value::Int(n), FieldType::Long) => Ok(Value::Long(i64::from(n))),
            (Value::Long(n), FieldType::Long) => Ok(Value::Long(n)),
            (Value::Long(n), FieldType::Integer) => i32::try_from(n).map(Value::Int).map_err(|_| {
                StorageError::SchemaMismatch(format!(
                    "field '{}' is declared integer but {} does not fit in 32 bits",
                    field, n
                ))
            }),
            (Value::Double(n), FieldType::Double) => Ok(Value::Double(n)),
            (Value::String(s), FieldType::String) => Ok(Value::String(s)),
            (value, declared) => Err(StorageError::SchemaMismatch(format!(
                "field '{}' is declared {} but got a {} value",
                field,
                declared,
                value.kind()
            ))),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
