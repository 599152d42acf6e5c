// src/db/models/content.rs

//! Content model - one content body per resource id

use crate::error::Result;
use crate::resource::ResourceId;
use rusqlite::{Connection, OptionalExtension, Row, params};
use sha2::{Digest, Sha256};

/// The content body shared by every sibling of a resource id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub resource_id: ResourceId,
    pub data: Vec<u8>,
    pub sha256: String,
    pub size: i64,
}

impl Content {
    /// Insert or replace the content of a resource id
    pub fn write(conn: &Connection, resource_id: &ResourceId, data: &[u8]) -> Result<Self> {
        let sha256 = sha256_hex(data);
        let size = data.len() as i64;
        conn.execute(
            "INSERT INTO contents (resource_id, data, sha256, size) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(resource_id) DO UPDATE SET
                data = excluded.data,
                sha256 = excluded.sha256,
                size = excluded.size,
                updated_at = CURRENT_TIMESTAMP",
            params![resource_id.to_string(), data, &sha256, size],
        )?;

        Ok(Self {
            resource_id: *resource_id,
            data: data.to_vec(),
            sha256,
            size,
        })
    }

    /// Find the content of a resource id
    pub fn find(conn: &Connection, resource_id: &ResourceId) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT resource_id, data, sha256, size FROM contents WHERE resource_id = ?1",
        )?;
        let content = stmt
            .query_row([resource_id.to_string()], Self::from_row)
            .optional()?;
        Ok(content)
    }

    /// Whether a content body exists for the resource id
    pub fn exists(conn: &Connection, resource_id: &ResourceId) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM contents WHERE resource_id = ?1",
            [resource_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete a content body
    pub fn delete(conn: &Connection, resource_id: &ResourceId) -> Result<()> {
        conn.execute(
            "DELETE FROM contents WHERE resource_id = ?1",
            [resource_id.to_string()],
        )?;
        Ok(())
    }

    /// Delete content no structure row points at any more
    pub fn delete_orphans(conn: &Connection) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM contents
             WHERE resource_id NOT IN (SELECT DISTINCT resource_id FROM resources)",
            [],
        )?;
        Ok(removed)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            resource_id: super::parse_column(row, 0)?,
            data: row.get(1)?,
            sha256: row.get(2)?,
            size: row.get(3)?,
        })
    }
}

/// Hex-encoded SHA-256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
