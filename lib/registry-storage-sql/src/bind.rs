//! Bind compiled parameters to driver arguments.

use registry_storage::{FieldType, StorageError, Value};
use sqlx::Arguments;
use sqlx::any::AnyArguments;

use crate::statement::Param;

/// Bind parameters in order. Nulls bind with their declared type so
/// engines that type-check placeholders accept them.
pub fn bind_params<'q>(params: &[Param]) -> Result<AnyArguments<'q>, StorageError> {
    let mut args = AnyArguments::default();
    for param in params {
        bind_value(&mut args, param)?;
    }
    Ok(args)
}

fn bind_value(args: &mut AnyArguments<'_>, param: &Param) -> Result<(), StorageError> {
    match &param.value {
        Value::Null => match param.field_type {
            FieldType::Boolean => args.add(None::<bool>),
            FieldType::Integer => args.add(None::<i32>),
            FieldType::Long => args.add(None::<i64>),
            FieldType::Double => args.add(None::<f64>),
            FieldType::String => args.add(None::<String>),
        },
        Value::Bool(b) => args.add(*b),
        Value::Int(i) => args.add(*i),
        Value::Long(l) => args.add(*l),
        Value::Double(d) => args.add(*d),
        Value::String(s) => args.add(s.clone()),
    }
    .map_err(|e| StorageError::execution(e.to_string()))
}
