// src/db/schema.rs

//! Database schema definitions and migrations
//!
//! Each migration is applied once, in order, and recorded in the
//! `schema_version` table.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date (version {})", current_version);
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!("Schema migration complete. Now at version {}", SCHEMA_VERSION);
    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::ConfigError(format!(
            "Unknown migration version: {version}"
        ))),
    }
}

/// Initial schema - Version 1
///
/// - resources: one row per structure id (path instance)
/// - contents: one row per resource id (shared by siblings)
/// - properties, access_control: per structure id
/// - relations: recorded (non content-derived) relations
/// - links: link tables of structured content
/// - locks: exclusive session locks and working locks
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE resources (
            structure_id TEXT PRIMARY KEY,
            resource_id TEXT NOT NULL,
            root_path TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL,
            state TEXT NOT NULL CHECK(state IN ('new', 'changed', 'unchanged')),
            flags INTEGER NOT NULL DEFAULT 0,
            locale TEXT,
            date_created TEXT NOT NULL,
            date_last_modified TEXT NOT NULL,
            user_created TEXT NOT NULL,
            user_last_modified TEXT NOT NULL
        );

        CREATE INDEX idx_resources_resource_id ON resources(resource_id);

        CREATE TABLE contents (
            resource_id TEXT PRIMARY KEY,
            data BLOB NOT NULL,
            sha256 TEXT NOT NULL,
            size INTEGER NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE properties (
            structure_id TEXT NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (structure_id, name),
            FOREIGN KEY (structure_id) REFERENCES resources(structure_id) ON DELETE CASCADE
        );

        CREATE TABLE access_control (
            structure_id TEXT NOT NULL,
            principal TEXT NOT NULL,
            allowed INTEGER NOT NULL DEFAULT 0,
            denied INTEGER NOT NULL DEFAULT 0,
            inherited INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (structure_id, principal),
            FOREIGN KEY (structure_id) REFERENCES resources(structure_id) ON DELETE CASCADE
        );

        CREATE TABLE relations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id TEXT NOT NULL,
            target_id TEXT,
            target_path TEXT NOT NULL,
            type TEXT NOT NULL,
            FOREIGN KEY (source_id) REFERENCES resources(structure_id) ON DELETE CASCADE
        );

        CREATE INDEX idx_relations_source ON relations(source_id);

        CREATE TABLE links (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id TEXT NOT NULL,
            element TEXT NOT NULL,
            raw_target TEXT NOT NULL,
            target_id TEXT,
            kind TEXT NOT NULL,
            FOREIGN KEY (source_id) REFERENCES resources(structure_id) ON DELETE CASCADE
        );

        CREATE INDEX idx_links_source ON links(source_id);

        CREATE TABLE locks (
            structure_id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('exclusive', 'working')),
            acquired_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (structure_id) REFERENCES resources(structure_id) ON DELETE CASCADE
        );
        ",
    )?;

    Ok(())
}

/// Version 2: principals carried by archives
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 2");

    conn.execute_batch(
        "
        CREATE TABLE principals (
            name TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK(kind IN ('user', 'group')),
            password_digest TEXT,
            description TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE group_members (
            group_name TEXT NOT NULL,
            user_name TEXT NOT NULL,
            PRIMARY KEY (group_name, user_name),
            FOREIGN KEY (group_name) REFERENCES principals(name) ON DELETE CASCADE,
            FOREIGN KEY (user_name) REFERENCES principals(name) ON DELETE CASCADE
        );
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // Second run is a no-op
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        for table in [
            "resources",
            "contents",
            "properties",
            "access_control",
            "relations",
            "links",
            "locks",
            "principals",
            "group_members",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
