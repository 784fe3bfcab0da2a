//! Database connection management

use crate::config::{DatabaseConfig, StoreConfig};
use crate::errors::{from_rusqlite, Result};
use rusqlite::Connection;
use std::path::Path;

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Open and configure the database named by the config
pub fn open_with_config(config: &StoreConfig) -> Result<Connection> {
    config.validate()?;
    let conn = if config.is_in_memory() {
        open_in_memory()?
    } else {
        open(&config.database.path)?
    };
    configure(&conn, &config.database)?;
    tracing::debug!(path = %config.database.path, "database opened");
    Ok(conn)
}

/// Apply connection pragmas
pub fn configure(conn: &Connection, config: &DatabaseConfig) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)
        .map_err(from_rusqlite)?;

    // journal_mode returns the resulting mode as a row
    conn.query_row(
        &format!("PRAGMA journal_mode = {}", config.journal_mode.as_pragma()),
        [],
        |_| Ok(()),
    )
    .map_err(from_rusqlite)?;

    Ok(())
}
