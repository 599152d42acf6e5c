// src/db/models/link.rs

//! LinkRow model - the stored link table of a structured content resource

use super::{parse_column, parse_optional_column};
use crate::error::Result;
use crate::relation::RelationType;
use crate::resource::StructureId;
use rusqlite::{Connection, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRow {
    pub source_id: StructureId,
    /// Name of the link element inside the content
    pub element: String,
    /// Target as written in the content
    pub raw_target: String,
    /// Resolved target, `None` for external or broken links
    pub target_id: Option<StructureId>,
    pub kind: RelationType,
}

impl LinkRow {
    /// Replace the link table of a resource
    pub fn replace_for(conn: &Connection, source: &StructureId, links: &[LinkRow]) -> Result<()> {
        conn.execute("DELETE FROM links WHERE source_id = ?1", [source.to_string()])?;
        let mut stmt = conn.prepare(
            "INSERT INTO links (source_id, element, raw_target, target_id, kind)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for link in links {
            stmt.execute(params![
                source.to_string(),
                &link.element,
                &link.raw_target,
                link.target_id.map(|id| id.to_string()),
                link.kind.as_str(),
            ])?;
        }
        Ok(())
    }

    /// The link table of a resource, in element order
    pub fn list_for(conn: &Connection, source: &StructureId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT source_id, element, raw_target, target_id, kind FROM links
             WHERE source_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([source.to_string()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            source_id: parse_column(row, 0)?,
            element: row.get(1)?,
            raw_target: row.get(2)?,
            target_id: parse_optional_column(row, 3)?,
            kind: parse_column(row, 4)?,
        })
    }
}
