//! Generic storable entities and the keys that address them.
//!
//! A `Storable` is a namespace plus a field map; its identity is the
//! namespace together with the values of its primary-key fields. The
//! storage layer never interprets field meaning beyond the declared
//! `Schema`.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::{Schema, Value};

/// A generic, schema-described entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Storable {
    namespace: String,
    fields: IndexMap<String, Value>,
    primary_key: Vec<String>,
}

impl Storable {
    /// Create an empty storable for the schema's namespace.
    pub fn new(schema: &Schema) -> Self {
        Self::from_parts(schema.namespace(), schema.primary_key().to_vec(), IndexMap::new())
    }

    pub fn from_parts(
        namespace: impl Into<String>,
        primary_key: Vec<String>,
        fields: IndexMap<String, Value>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            fields,
            primary_key,
        }
    }

    /// Set a field (builder form).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fields in the order they were set.
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Value of a single-column integer primary key, if set.
    pub fn id(&self) -> Option<i64> {
        match self.primary_key.as_slice() {
            [only] => self.fields.get(only).and_then(Value::as_i64),
            _ => None,
        }
    }

    /// Assign the single-column primary key.
    ///
    /// No-op for composite keys, which are never generated.
    pub fn set_id(&mut self, id: i64) {
        if let [only] = self.primary_key.as_slice() {
            self.fields.insert(only.clone(), Value::Long(id));
        }
    }

    /// The key addressing this storable: its primary-key fields only.
    pub fn storable_key(&self) -> StorableKey {
        let fields = self
            .primary_key
            .iter()
            .map(|k| (k.clone(), self.fields.get(k).cloned().unwrap_or(Value::Null)))
            .collect();
        StorableKey {
            namespace: self.namespace.clone(),
            fields,
        }
    }
}

/// Address of a single storable: namespace plus primary-key values.
#[derive(Debug, Clone, PartialEq)]
pub struct StorableKey {
    namespace: String,
    fields: BTreeMap<String, Value>,
}

impl StorableKey {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a key field (builder form).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }
}

impl std::fmt::Display for StorableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.namespace)?;
        for (name, value) in &self.fields {
            write!(f, " {}={:?}", name, value)?;
        }
        Ok(())
    }
}
