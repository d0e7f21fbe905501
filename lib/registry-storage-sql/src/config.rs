//! Executor configuration from an open property map.

use std::time::Duration;

use registry_storage::StorageError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dialect::Dialect;

pub const DATA_SOURCE_CLASS_NAME: &str = "dataSourceClassName";
pub const DATA_SOURCE_URL: &str = "dataSource.url";
pub const QUERY_TIMEOUT_IN_SECS: &str = "queryTimeoutInSecs";
pub const MAXIMUM_POOL_SIZE: &str = "maximumPoolSize";
pub const CONNECTION_TIMEOUT: &str = "connectionTimeout";
pub const UPSERT_FALLBACK: &str = "upsertFallback";

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// When a failed upsert is retried as a plain update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertFallback {
    /// Only after a unique-key violation; other failures surface, and so
    /// does the violation when the update changes no row.
    #[default]
    #[serde(rename = "conflict")]
    OnConflict,
    /// After any execution failure. The upsert reports success even when
    /// the update changes no row.
    #[serde(rename = "always")]
    Always,
}

/// Per-statement execution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// `None` waits indefinitely.
    pub query_timeout: Option<Duration>,
    pub upsert_fallback: UpsertFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_source: String,
    pub url: String,
    pub dialect: Dialect,
    /// Pool size; also the statement cache capacity.
    pub max_connections: u32,
    pub connection_timeout: Duration,
    pub execution: ExecutionConfig,
}

impl StorageConfig {
    pub fn from_properties(props: &Map<String, Value>) -> Result<Self, StorageError> {
        let data_source = required_str(props, DATA_SOURCE_CLASS_NAME)?;
        let url = required_str(props, DATA_SOURCE_URL)?;
        let dialect = Dialect::from_data_source(&data_source)?;

        let query_timeout = match optional_i64(props, QUERY_TIMEOUT_IN_SECS)? {
            Some(secs) if secs < 0 => {
                return Err(StorageError::InvalidConfig(format!(
                    "{} property can not be negative",
                    QUERY_TIMEOUT_IN_SECS
                )));
            }
            // zero disables the limit
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs.unsigned_abs())),
        };

        let max_connections = match optional_i64(props, MAXIMUM_POOL_SIZE)? {
            None => DEFAULT_POOL_SIZE,
            Some(n) => u32::try_from(n).ok().filter(|n| *n > 0).ok_or_else(|| {
                StorageError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    MAXIMUM_POOL_SIZE, n
                ))
            })?,
        };

        let connection_timeout = match optional_i64(props, CONNECTION_TIMEOUT)? {
            None => Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS),
            Some(ms) if ms < 0 => {
                return Err(StorageError::InvalidConfig(format!(
                    "{} property can not be negative",
                    CONNECTION_TIMEOUT
                )));
            }
            Some(ms) => Duration::from_millis(ms.unsigned_abs()),
        };

        let upsert_fallback = match props.get(UPSERT_FALLBACK) {
            None | Some(Value::Null) => UpsertFallback::default(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                StorageError::InvalidConfig(format!("{}: {}", UPSERT_FALLBACK, e))
            })?,
        };

        Ok(Self {
            data_source,
            url,
            dialect,
            max_connections,
            connection_timeout,
            execution: ExecutionConfig {
                query_timeout,
                upsert_fallback,
            },
        })
    }

    /// Parse a JSON object of properties.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(props) => Self::from_properties(&props),
            _ => Err(StorageError::InvalidConfig(
                "storage properties must be a JSON object".to_string(),
            )),
        }
    }
}

fn required_str(props: &Map<String, Value>, key: &str) -> Result<String, StorageError> {
    match props.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(StorageError::InvalidConfig(
            format!("missing required property {}", key),
        )),
        Some(other) => Err(StorageError::InvalidConfig(format!(
            "{} must be a string, got {}",
            key, other
        ))),
    }
}

/// Integer property given as a JSON number or a numeric string.
fn optional_i64(props: &Map<String, Value>, key: &str) -> Result<Option<i64>, StorageError> {
    let invalid =
        |v: &Value| StorageError::InvalidConfig(format!("{} must be an integer, got {}", key, v));
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(&Value::Number(n.clone()))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(&Value::String(s.clone()))),
        Some(other) => Err(invalid(other)),
    }
}
