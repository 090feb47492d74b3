// src/db/mod.rs

//! SQLite backend for the product registry
//!
//! All registry state lives in one database file. Mutations run inside a
//! single transaction so readers observe either the old or the new state.

pub mod models;
pub mod paths;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// How long a connection waits for another writer before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

fn configure(conn: &Connection) -> Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

/// Create the database (and its parent directory) and apply migrations
pub fn init(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!("Initializing registry database at {}", db_path.display());
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(())
}

/// Open an existing database for reading and writing
pub fn open(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::FileNotFound(db_path.display().to_string()));
    }
    debug!("Opening registry database {}", db_path.display());
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| Error::BadRegistryFile(format!("{}: {e}", db_path.display())))?;
    check_schema(&conn, db_path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open an existing database without write intent
pub fn open_readonly(db_path: &Path) -> Result<Connection> {
    if !db_path.exists() {
        return Err(Error::FileNotFound(db_path.display().to_string()));
    }
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| Error::BadRegistryFile(format!("{}: {e}", db_path.display())))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    check_schema(&conn, db_path)?;
    Ok(conn)
}

fn check_schema(conn: &Connection, db_path: &Path) -> Result<()> {
    let version = schema::get_schema_version(conn)
        .map_err(|e| Error::BadRegistryFile(format!("{}: {e}", db_path.display())))?;
    if version == 0 || version > schema::SCHEMA_VERSION {
        return Err(Error::BadRegistryFile(format!(
            "{}: unsupported schema version {version}",
            db_path.display()
        )));
    }
    Ok(())
}

/// Run `f` inside an immediate transaction, committing only on success
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested/registry.db");

        assert!(matches!(open(&db_path), Err(Error::FileNotFound(_))));

        init(&db_path).unwrap();
        let conn = open(&db_path).unwrap();
        assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);

        // init is idempotent
        init(&db_path).unwrap();
        open_readonly(&db_path).unwrap();
    }

    #[test]
    fn test_garbage_file_is_bad_registry() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("registry.db");
        std::fs::write(&db_path, b"definitely not sqlite, just some bytes padding it out").unwrap();

        assert!(matches!(open(&db_path), Err(Error::BadRegistryFile(_))));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("registry.db");
        init(&db_path).unwrap();
        let mut conn = open(&db_path).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO components (uuid, instance, comp_type) VALUES ('u', 1, 'COMPONENT')",
                [],
            )?;
            Err(Error::CannotWrite)
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM components", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
