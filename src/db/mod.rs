// src/db/mod.rs

//! SQLite storage for the content repository
//!
//! The repository keeps every resource, content body, property, access
//! control entry, relation, link table row, lock and principal in a single
//! SQLite database. `schema` owns the migrations; `models` maps rows to
//! structs with small CRUD helpers.

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Default database path used by the CLI
pub const DEFAULT_DB_PATH: &str = "vfsport.db";

/// Create a new database file and apply the schema
pub fn init(db_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    info!("Initialized repository database at {}", db_path);
    Ok(())
}

/// Open an existing database
pub fn open(db_path: &str) -> Result<Connection> {
    if !Path::new(db_path).exists() {
        return Err(Error::NotFoundError(format!(
            "Repository database not found at {db_path} (run `vfsport init` first)"
        )));
    }

    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    debug!("Opened repository database at {}", db_path);
    Ok(conn)
}

/// Open a fresh in-memory database with the schema applied
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Run `f` inside a transaction, committing on success
pub fn transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    Ok(())
}
