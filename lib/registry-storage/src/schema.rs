//! Declared shape of a namespace: its fields, their types, and the primary key.

use serde::{Deserialize, Serialize};

use crate::{FieldType, StorageError};

/// A single declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Schema of one namespace.
///
/// Field order is the column order used by every compiled statement.
///
/// ```text
/// let schema = Schema::builder("models")
///     .field("id", FieldType::Long)
///     .field("name", FieldType::String)
///     .primary_key(["id"])
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "SchemaDef")]
pub struct Schema {
    namespace: String,
    fields: Vec<Field>,
    primary_key: Vec<String>,
}

impl Schema {
    pub fn builder(namespace: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            namespace: namespace.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.field_type)
    }

    /// Look up a field, failing with `SchemaMismatch` when it is not declared.
    pub fn require(&self, name: &str) -> Result<FieldType, StorageError> {
        self.field_type(name).ok_or_else(|| {
            StorageError::SchemaMismatch(format!(
                "field '{}' is not declared in namespace '{}'",
                name, self.namespace
            ))
        })
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|k| k == name)
    }

    /// The identity field: a single-column primary key of integer type.
    ///
    /// Only this column can be filled in by the database on insert.
    pub fn id_field(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [only] => match self.field_type(only) {
                Some(FieldType::Long) | Some(FieldType::Integer) => Some(only.as_str()),
                _ => None,
            },
            _ => None,
        }
    }
}

pub struct SchemaBuilder {
    namespace: String,
    fields: Vec<Field>,
    primary_key: Vec<String>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(Field {
            name: name.into(),
            field_type,
        });
        self
    }

    pub fn primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<Schema, StorageError> {
        SchemaDef {
            namespace: self.namespace,
            fields: self.fields,
            primary_key: self.primary_key,
        }
        .try_into()
    }
}

/// Unvalidated schema as read from configuration.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaDef {
    namespace: String,
    fields: Vec<Field>,
    primary_key: Vec<String>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = StorageError;

    fn try_from(def: SchemaDef) -> Result<Self, Self::Error> {
        if def.namespace.is_empty() {
            return Err(StorageError::SchemaMismatch(
                "namespace must not be empty".to_string(),
            ));
        }
        for (idx, field) in def.fields.iter().enumerate() {
            if def.fields[..idx].iter().any(|f| f.name == field.name) {
                return Err(StorageError::SchemaMismatch(format!(
                    "field '{}' is declared twice in namespace '{}'",
                    field.name, def.namespace
                )));
            }
        }
        if def.primary_key.is_empty() {
            return Err(StorageError::SchemaMismatch(format!(
                "namespace '{}' declares no primary key",
                def.namespace
            )));
        }
        for key in &def.primary_key {
            if !def.fields.iter().any(|f| &f.name == key) {
                return Err(StorageError::SchemaMismatch(format!(
                    "primary key field '{}' is not declared in namespace '{}'",
                    key, def.namespace
                )));
            }
        }

        Ok(Schema {
            namespace: def.namespace,
            fields: def.fields,
            primary_key: def.primary_key,
        })
    }
}
