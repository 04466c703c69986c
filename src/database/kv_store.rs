use crate::error::AppError;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Durable client storage: string values under string keys.
///
/// No ordering or transaction guarantees beyond last-write-wins.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// SQLite-backed key-value storage
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Wraps a connection whose schema is already initialized
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        Ok(Self::new(super::init_database(db_path)?))
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()?;
        super::schema::init_schema(&conn)?;
        Ok(Self::new(conn))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, AppError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Other("Storage lock poisoned".to_string()))?;
        Ok(f(&conn)?)
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key]))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert_eq!(storage.get("draft").unwrap(), None);

        storage.set("draft", "{\"a\":1}").unwrap();
        storage.set("draft", "{\"a\":2}").unwrap();
        assert_eq!(storage.get("draft").unwrap().as_deref(), Some("{\"a\":2}"));

        storage.remove("draft").unwrap();
        assert_eq!(storage.get("draft").unwrap(), None);
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.remove("nothing").unwrap();
    }
}
