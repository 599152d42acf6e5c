// src/db/models/resource.rs

//! Resource model - one row per structure id

use super::{parse_column, timestamp_column};
use crate::error::Result;
use crate::resource::{
    ResourceId, ResourceIdentity, ResourceMetadata, ResourceState, ResourceType, StructureId,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

const COLUMNS: &str = "structure_id, resource_id, root_path, type, state, flags, locale, \
                       date_created, date_last_modified, user_created, user_last_modified";

/// A path instance of a resource in the live repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub structure_id: StructureId,
    pub resource_id: ResourceId,
    pub root_path: String,
    pub resource_type: ResourceType,
    pub state: ResourceState,
    pub metadata: ResourceMetadata,
}

impl Resource {
    /// Create a new Resource in state `new`
    pub fn new(
        structure_id: StructureId,
        resource_id: ResourceId,
        root_path: String,
        resource_type: ResourceType,
        metadata: ResourceMetadata,
    ) -> Self {
        Self {
            structure_id,
            resource_id,
            root_path,
            resource_type,
            state: ResourceState::New,
            metadata,
        }
    }

    pub fn identity(&self) -> ResourceIdentity {
        ResourceIdentity {
            structure_id: self.structure_id,
            resource_id: self.resource_id,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.resource_type.is_folder()
    }

    /// Insert this resource
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO resources (structure_id, resource_id, root_path, type, state, flags, locale,
                                    date_created, date_last_modified, user_created, user_last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                self.structure_id.to_string(),
                self.resource_id.to_string(),
                &self.root_path,
                self.resource_type.as_str(),
                self.state.as_str(),
                self.metadata.flags,
                &self.metadata.locale,
                self.metadata.date_created.to_rfc3339(),
                self.metadata.date_last_modified.to_rfc3339(),
                &self.metadata.user_created,
                &self.metadata.user_last_modified,
            ],
        )?;
        Ok(())
    }

    /// Update every column except the structure id
    pub fn update(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE resources SET resource_id = ?2, root_path = ?3, type = ?4, state = ?5,
                    flags = ?6, locale = ?7, date_created = ?8, date_last_modified = ?9,
                    user_created = ?10, user_last_modified = ?11
             WHERE structure_id = ?1",
            params![
                self.structure_id.to_string(),
                self.resource_id.to_string(),
                &self.root_path,
                self.resource_type.as_str(),
                self.state.as_str(),
                self.metadata.flags,
                &self.metadata.locale,
                self.metadata.date_created.to_rfc3339(),
                self.metadata.date_last_modified.to_rfc3339(),
                &self.metadata.user_created,
                &self.metadata.user_last_modified,
            ],
        )?;
        Ok(())
    }

    /// Find a resource by structure id
    pub fn find_by_id(conn: &Connection, id: &StructureId) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM resources WHERE structure_id = ?1"
        ))?;
        let resource = stmt.query_row([id.to_string()], Self::from_row).optional()?;
        Ok(resource)
    }

    /// Find a resource by root path
    pub fn find_by_path(conn: &Connection, root_path: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM resources WHERE root_path = ?1"
        ))?;
        let resource = stmt.query_row([root_path], Self::from_row).optional()?;
        Ok(resource)
    }

    /// All structure instances backed by a resource id
    pub fn find_by_resource_id(conn: &Connection, id: &ResourceId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM resources WHERE resource_id = ?1 ORDER BY root_path"
        ))?;
        let resources = stmt
            .query_map([id.to_string()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(resources)
    }

    /// Number of structure instances backed by a resource id
    pub fn count_siblings(conn: &Connection, id: &ResourceId) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM resources WHERE resource_id = ?1",
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// The resource at `root_path` and everything below it, ordered by path
    pub fn list_subtree(conn: &Connection, root_path: &str) -> Result<Vec<Self>> {
        let sql = if root_path == "/" {
            format!("SELECT {COLUMNS} FROM resources ORDER BY root_path")
        } else {
            format!(
                "SELECT {COLUMNS} FROM resources
                 WHERE root_path = ?1 OR substr(root_path, 1, length(?1) + 1) = ?1 || '/'
                 ORDER BY root_path"
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = if root_path == "/" {
            stmt.query_map([], Self::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            stmt.query_map([root_path], Self::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(rows)
    }

    /// Direct children of a folder
    pub fn list_children(conn: &Connection, folder: &str) -> Result<Vec<Self>> {
        let prefix = if folder == "/" {
            "/".to_string()
        } else {
            format!("{folder}/")
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM resources
             WHERE substr(root_path, 1, length(?1)) = ?1
               AND root_path != ?1
               AND instr(substr(root_path, length(?1) + 1), '/') = 0
             ORDER BY root_path"
        ))?;
        let rows = stmt
            .query_map([prefix], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rename a path prefix, carrying every descendant along
    pub fn move_subtree(conn: &Connection, from: &str, to: &str) -> Result<usize> {
        let moved = conn.execute(
            "UPDATE resources
             SET root_path = ?2 || substr(root_path, length(?1) + 1)
             WHERE root_path = ?1 OR substr(root_path, 1, length(?1) + 1) = ?1 || '/'",
            params![from, to],
        )?;
        Ok(moved)
    }

    /// Set the publish state of one resource
    pub fn set_state(conn: &Connection, id: &StructureId, state: ResourceState) -> Result<()> {
        conn.execute(
            "UPDATE resources SET state = ?2 WHERE structure_id = ?1",
            params![id.to_string(), state.as_str()],
        )?;
        Ok(())
    }

    /// Delete one structure row (properties, ACL, relations, links and locks cascade)
    pub fn delete(conn: &Connection, id: &StructureId) -> Result<()> {
        conn.execute("DELETE FROM resources WHERE structure_id = ?1", [id.to_string()])?;
        Ok(())
    }

    /// Convert a database row to a Resource
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            structure_id: parse_column(row, 0)?,
            resource_id: parse_column(row, 1)?,
            root_path: row.get(2)?,
            resource_type: parse_column(row, 3)?,
            state: parse_column(row, 4)?,
            metadata: ResourceMetadata {
                flags: row.get(5)?,
                locale: row.get(6)?,
                date_created: timestamp_column(row, 7)?,
                date_last_modified: timestamp_column(row, 8)?,
                user_created: row.get(9)?,
                user_last_modified: row.get(10)?,
            },
        })
    }
}
