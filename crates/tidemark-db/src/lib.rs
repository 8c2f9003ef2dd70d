//! # tidemark-db
//!
//! Storage layer for the tidemark daemon.
//! Manages the single SQLite database at `$TIDEMARK_DATA_DIR/tidemark.db`.
//!
//! ## Layout
//!
//! - WAL mode mandatory
//! - Foreign keys enforced
//! - All timestamps are Unix epoch seconds
//! - Balance-time credit is a `u128` persisted as decimal TEXT
//! - Schema version stored in `PRAGMA user_version`
//!
//! Multi-table invariants (cycle application, cursor advancement,
//! distribution commit) are owned by transactional functions in
//! [`queries`]; callers never stitch those writes together themselves.

pub mod migrations;
pub mod queries;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ledger rejected operation: {0}")]
    Ledger(#[from] tidemark_ledger::LedgerError),

    #[error("accrual rejected operation: {0}")]
    Accrual(#[from] tidemark_accrual::AccrualError),
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the tidemark database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory() {
        let conn = open_memory().expect("open in-memory db");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("get user_version");
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_wal_mode() {
        let conn = open_memory().expect("open");
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("get journal_mode");
        // In-memory databases use "memory" mode, not WAL
        assert!(mode == "wal" || mode == "memory");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = open_memory().expect("open");
        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("get foreign_keys");
        assert_eq!(fk, 1);
    }
}
