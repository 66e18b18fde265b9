use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

pub const KEY_WORKSPACE_ID: &str = "workspace_id";
pub const KEY_LAST_FILLED_DATE: &str = "last_filled_date";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Small key-value record kept between runs. The remote service stays the source of truth.
pub trait SessionCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CachedValue>, InfraError>;
    fn put(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSessionCache {
    db_path: PathBuf,
}

impl SqliteSessionCache {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl SessionCache for SqliteSessionCache {
    fn get(&self, key: &str) -> Result<Option<CachedValue>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String)> = connection
            .query_row(
                "SELECT value, updated_at FROM session_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, updated_at_raw)) = row else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&updated_at_raw).map_err(|error| {
            InfraError::InvalidConfig(format!(
                "invalid session_cache.updated_at '{}' for key '{}': {error}",
                updated_at_raw, key
            ))
        })?;

        Ok(Some(CachedValue {
            value,
            updated_at: parsed.with_timezone(&Utc),
        }))
    }

    fn put(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO session_cache (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value, updated_at.to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct InMemorySessionCache {
    values: std::sync::Mutex<std::collections::HashMap<String, CachedValue>>,
}

#[cfg(test)]
impl SessionCache for InMemorySessionCache {
    fn get(&self, key: &str) -> Result<Option<CachedValue>, InfraError> {
        let values = self.values.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("session cache lock poisoned: {error}"))
        })?;
        Ok(values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str, updated_at: DateTime<Utc>) -> Result<(), InfraError> {
        let mut values = self.values.lock().map_err(|error| {
            InfraError::InvalidConfig(format!("session cache lock poisoned: {error}"))
        })?;
        values.insert(
            key.to_string(),
            CachedValue {
                value: value.to_string(),
                updated_at,
            },
        );
        Ok(())
    }
}
