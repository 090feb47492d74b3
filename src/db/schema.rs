// src/db/schema.rs

//! Database schema definitions and migrations for the registry
//!
//! The schema is versioned through a `schema_version` table. Migrations are
//! applied in order and each one runs exactly once.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Get the current schema version, 0 for a database that has none
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let has_table: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    if has_table.is_none() {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying registry migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::BadRegistryFile(format!(
            "unknown migration version {version}"
        ))),
    }
}

/// Initial schema
///
/// - components: one row per (uuid, instance)
/// - display_names: localized names keyed by language
/// - attributes: free-form name/value pairs in insertion order
/// - compatible_versions: ordered, most recent first
/// - children: ordered parent to child edges
/// - required: requirement edges; dependents are the reverse lookup
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE components (
            uuid TEXT NOT NULL,
            instance INTEGER NOT NULL CHECK(instance > 0),
            version TEXT,
            unique_name TEXT,
            comp_type TEXT NOT NULL CHECK(comp_type IN ('PRODUCT', 'FEATURE', 'COMPONENT')),
            vendor TEXT,
            location TEXT,
            uninstaller TEXT,
            parent_uuid TEXT,
            parent_instance INTEGER,
            parent_version TEXT,
            registered_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (uuid, instance)
        );

        CREATE INDEX idx_components_unique_name ON components(unique_name);
        CREATE INDEX idx_components_parent ON components(parent_uuid, parent_instance);

        CREATE TABLE display_names (
            uuid TEXT NOT NULL,
            instance INTEGER NOT NULL,
            language TEXT NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY (uuid, instance, language),
            FOREIGN KEY (uuid, instance) REFERENCES components(uuid, instance) ON DELETE CASCADE
        );

        CREATE TABLE attributes (
            uuid TEXT NOT NULL,
            instance INTEGER NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (uuid, instance, name),
            FOREIGN KEY (uuid, instance) REFERENCES components(uuid, instance) ON DELETE CASCADE
        );

        CREATE TABLE compatible_versions (
            uuid TEXT NOT NULL,
            instance INTEGER NOT NULL,
            position INTEGER NOT NULL,
            version TEXT NOT NULL,
            PRIMARY KEY (uuid, instance, position),
            FOREIGN KEY (uuid, instance) REFERENCES components(uuid, instance) ON DELETE CASCADE
        );

        CREATE TABLE children (
            parent_uuid TEXT NOT NULL,
            parent_instance INTEGER NOT NULL,
            position INTEGER NOT NULL,
            child_uuid TEXT NOT NULL,
            child_instance INTEGER NOT NULL,
            child_version TEXT,
            PRIMARY KEY (parent_uuid, parent_instance, child_uuid, child_instance),
            FOREIGN KEY (parent_uuid, parent_instance) REFERENCES components(uuid, instance) ON DELETE CASCADE
        );

        CREATE TABLE required (
            uuid TEXT NOT NULL,
            instance INTEGER NOT NULL,
            req_uuid TEXT NOT NULL,
            req_instance INTEGER NOT NULL,
            req_version TEXT,
            PRIMARY KEY (uuid, instance, req_uuid, req_instance),
            FOREIGN KEY (uuid, instance) REFERENCES components(uuid, instance) ON DELETE CASCADE
        );

        CREATE INDEX idx_required_target ON required(req_uuid, req_instance);
        ",
    )?;

    Ok(())
}

/// Position column for required edges so they load in the order given
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE required ADD COLUMN position INTEGER NOT NULL DEFAULT 0;
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_from_empty() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // second run is a no-op
        migrate(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, SCHEMA_VERSION as i64);
    }
}
