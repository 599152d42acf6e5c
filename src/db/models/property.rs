// src/db/models/property.rs

//! PropertyEntry model - named string properties per structure id

use crate::error::Result;
use crate::resource::StructureId;
use rusqlite::{Connection, Row, params};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEntry {
    pub structure_id: StructureId,
    pub name: String,
    pub value: String,
}

impl PropertyEntry {
    /// All properties of a resource
    pub fn list_for(conn: &Connection, id: &StructureId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT structure_id, name, value FROM properties WHERE structure_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map([id.to_string()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Properties of a resource as a name -> value map
    pub fn map_for(conn: &Connection, id: &StructureId) -> Result<BTreeMap<String, String>> {
        Ok(Self::list_for(conn, id)?
            .into_iter()
            .map(|p| (p.name, p.value))
            .collect())
    }

    /// Replace every property of a resource
    pub fn replace_all(
        conn: &Connection,
        id: &StructureId,
        properties: &BTreeMap<String, String>,
    ) -> Result<()> {
        conn.execute("DELETE FROM properties WHERE structure_id = ?1", [id.to_string()])?;
        let mut stmt = conn
            .prepare("INSERT INTO properties (structure_id, name, value) VALUES (?1, ?2, ?3)")?;
        for (name, value) in properties {
            stmt.execute(params![id.to_string(), name, value])?;
        }
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            structure_id: super::parse_column(row, 0)?,
            name: row.get(1)?,
            value: row.get(2)?,
        })
    }
}
