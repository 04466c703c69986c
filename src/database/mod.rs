pub mod kv_store;
pub mod schema;

use crate::error::AppError;
use rusqlite::Connection;
use std::path::Path;

pub use kv_store::{KeyValueStorage, SqliteStorage};

/// Opens (and creates if needed) the client database with its schema
pub fn init_database(db_path: &Path) -> Result<Connection, AppError> {
    // Make sure the directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    schema::init_schema(&conn)?;

    log::debug!("Opened database at {}", db_path.display());
    Ok(conn)
}
