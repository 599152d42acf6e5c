// src/db/models/ace.rs

//! AceEntry model - stored access control entries

use crate::acl::{AccessControlEntry, PermissionSet};
use crate::error::Result;
use crate::resource::StructureId;
use rusqlite::{Connection, Row, params};

/// Access control entries attached to a structure id
pub struct AceEntry;

impl AceEntry {
    /// The ACL stored on a resource, ordered by principal
    pub fn list_for(conn: &Connection, id: &StructureId) -> Result<Vec<AccessControlEntry>> {
        let mut stmt = conn.prepare(
            "SELECT principal, allowed, denied, inherited FROM access_control
             WHERE structure_id = ?1 ORDER BY principal",
        )?;
        let rows = stmt
            .query_map([id.to_string()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace the ACL stored on a resource
    pub fn replace_all(
        conn: &Connection,
        id: &StructureId,
        entries: &[AccessControlEntry],
    ) -> Result<()> {
        conn.execute(
            "DELETE FROM access_control WHERE structure_id = ?1",
            [id.to_string()],
        )?;
        let mut stmt = conn.prepare(
            "INSERT OR REPLACE INTO access_control (structure_id, principal, allowed, denied, inherited)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for ace in entries {
            stmt.execute(params![
                id.to_string(),
                &ace.principal,
                ace.permissions.allowed,
                ace.permissions.denied,
                ace.inherited,
            ])?;
        }
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<AccessControlEntry> {
        Ok(AccessControlEntry {
            principal: row.get(0)?,
            permissions: PermissionSet::new(row.get(1)?, row.get(2)?),
            inherited: row.get(3)?,
        })
    }
}
