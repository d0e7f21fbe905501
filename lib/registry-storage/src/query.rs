//! Database-agnostic search predicates and ordering.
//!
//! Every dialect must be able to translate every predicate here; the
//! operator set is deliberately small.

use serde::{Deserialize, Serialize};

use crate::Value;

/// Filter conditions for searches.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// field = value (`IS NULL` when value is null)
    Eq(String, Value),
    /// field != value
    Ne(String, Value),
    /// field > value
    Gt(String, Value),
    /// field >= value
    Gte(String, Value),
    /// field < value
    Lt(String, Value),
    /// field <= value
    Lte(String, Value),
    /// low <= field <= high
    Between(String, Value, Value),
    /// field starts with the given text (case-sensitive)
    StartsWith(String, String),
    /// field IN (values); an empty list matches nothing
    In(String, Vec<Value>),
    /// field IS NULL
    IsNull(String),
    /// field IS NOT NULL
    IsNotNull(String),
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Predicate::Eq(f, _)
            | Predicate::Ne(f, _)
            | Predicate::Gt(f, _)
            | Predicate::Gte(f, _)
            | Predicate::Lt(f, _)
            | Predicate::Lte(f, _)
            | Predicate::Between(f, _, _)
            | Predicate::StartsWith(f, _)
            | Predicate::In(f, _)
            | Predicate::IsNull(f)
            | Predicate::IsNotNull(f) => f,
        }
    }
}

/// Requested ordering on one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderByField {
    pub field: String,
    pub descending: bool,
}

impl OrderByField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// A filtered search over one namespace.
///
/// Predicates are combined with AND, in the order they were added.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub namespace: String,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderByField>,
}

impl SearchQuery {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            predicates: Vec::new(),
            order_by: Vec::new(),
        }
    }

    /// Add a predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Add an equality predicate (shorthand for Predicate::Eq).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Eq(field.into(), value.into()))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Ne(field.into(), value.into()))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Gt(field.into(), value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Gte(field.into(), value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Lt(field.into(), value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Predicate::Lte(field.into(), value.into()))
    }

    /// Add an inclusive range predicate.
    pub fn between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.filter(Predicate::Between(field.into(), low.into(), high.into()))
    }

    /// Add a prefix predicate.
    pub fn starts_with(self, field: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.filter(Predicate::StartsWith(field.into(), prefix.into()))
    }

    /// Add an IN predicate.
    pub fn r#in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(Predicate::In(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn order_by(mut self, order: OrderByField) -> Self {
        self.order_by.push(order);
        self
    }
}
