// src/db/models/lock.rs

//! LockEntry model - resource locks
//!
//! An `exclusive` lock is held by an import session while it writes an entry.
//! A `working` lock marks a resource as changed by its owner and stays until
//! the owner publishes or unlocks it.

use super::{parse_column, timestamp_column};
use crate::error::Result;
use crate::resource::StructureId;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    Exclusive,
    Working,
}

impl LockKind {
    pub fn as_str(&self) -> &str {
        match self {
            LockKind::Exclusive => "exclusive",
            LockKind::Working => "working",
        }
    }
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LockKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exclusive" => Ok(LockKind::Exclusive),
            "working" => Ok(LockKind::Working),
            _ => Err(format!("Invalid lock kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEntry {
    pub structure_id: StructureId,
    pub owner: String,
    pub kind: LockKind,
    pub acquired_at: DateTime<Utc>,
}

impl LockEntry {
    pub fn new(structure_id: StructureId, owner: &str, kind: LockKind) -> Self {
        Self {
            structure_id,
            owner: owner.to_string(),
            kind,
            acquired_at: Utc::now(),
        }
    }

    /// Whether `owner` may write through this lock
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// The lock on a resource, if any
    pub fn find(conn: &Connection, id: &StructureId) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT structure_id, owner, kind, acquired_at FROM locks WHERE structure_id = ?1",
        )?;
        let lock = stmt.query_row([id.to_string()], Self::from_row).optional()?;
        Ok(lock)
    }

    /// Insert or replace the lock on a resource
    pub fn set(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO locks (structure_id, owner, kind, acquired_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(structure_id) DO UPDATE SET
                owner = excluded.owner,
                kind = excluded.kind,
                acquired_at = excluded.acquired_at",
            params![
                self.structure_id.to_string(),
                &self.owner,
                self.kind.as_str(),
                self.acquired_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Remove the lock on a resource
    pub fn delete(conn: &Connection, id: &StructureId) -> Result<()> {
        conn.execute("DELETE FROM locks WHERE structure_id = ?1", [id.to_string()])?;
        Ok(())
    }

    /// Remove every lock held by `owner`
    pub fn release_owned_by(conn: &Connection, owner: &str) -> Result<usize> {
        let released = conn.execute("DELETE FROM locks WHERE owner = ?1", [owner])?;
        Ok(released)
    }

    /// Every lock held by `owner`
    pub fn list_owned_by(conn: &Connection, owner: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT structure_id, owner, kind, acquired_at FROM locks
             WHERE owner = ?1 ORDER BY acquired_at",
        )?;
        let rows = stmt
            .query_map([owner], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            structure_id: parse_column(row, 0)?,
            owner: row.get(1)?,
            kind: parse_column(row, 2)?,
            acquired_at: timestamp_column(row, 3)?,
        })
    }
}
