use std::time::Duration;

use thiserror::Error;

/// Classification of a statement the database rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    /// A unique or primary-key constraint refused the row.
    UniqueViolation,
    Other,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("Connection acquisition failed: {0}")]
    ConnectionAcquisition(String),

    #[error("Execution error: {message}")]
    Execution { kind: ExecutionKind, message: String },

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl StorageError {
    pub fn execution(message: impl Into<String>) -> Self {
        StorageError::Execution {
            kind: ExecutionKind::Other,
            message: message.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            StorageError::Execution {
                kind: ExecutionKind::UniqueViolation,
                ..
            }
        )
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::ConnectionAcquisition(e.to_string())
            }
            sqlx::Error::Database(db) => {
                let kind = if db.is_unique_violation() {
                    ExecutionKind::UniqueViolation
                } else {
                    ExecutionKind::Other
                };
                StorageError::Execution {
                    kind,
                    message: db.to_string(),
                }
            }
            other => StorageError::execution(other.to_string()),
        }
    }
}
