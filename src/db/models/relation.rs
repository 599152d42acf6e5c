// src/db/models/relation.rs

//! RelationRow model - relations stored on a source resource

use super::{parse_column, parse_optional_column};
use crate::error::Result;
use crate::relation::RelationType;
use crate::resource::StructureId;
use rusqlite::{Connection, Row, params};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRow {
    pub id: Option<i64>,
    pub source_id: StructureId,
    pub target_id: Option<StructureId>,
    pub target_path: String,
    pub relation_type: RelationType,
}

impl RelationRow {
    pub fn new(
        source_id: StructureId,
        target_id: Option<StructureId>,
        target_path: String,
        relation_type: RelationType,
    ) -> Self {
        Self {
            id: None,
            source_id,
            target_id,
            target_path,
            relation_type,
        }
    }

    /// Insert this relation and record its row id
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO relations (source_id, target_id, target_path, type) VALUES (?1, ?2, ?3, ?4)",
            params![
                self.source_id.to_string(),
                self.target_id.map(|id| id.to_string()),
                &self.target_path,
                self.relation_type.as_str(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// All relations whose source is `id`
    pub fn list_for(conn: &Connection, id: &StructureId) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, source_id, target_id, target_path, type FROM relations
             WHERE source_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([id.to_string()], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace the recorded relations of a source
    ///
    /// Content-derived relations are left alone; the link table owns them.
    pub fn replace_recorded(
        conn: &Connection,
        source: &StructureId,
        relations: &[RelationRow],
    ) -> Result<()> {
        conn.execute(
            "DELETE FROM relations WHERE source_id = ?1 AND type IN ('category', 'manual')",
            [source.to_string()],
        )?;
        for relation in relations
            .iter()
            .filter(|r| !r.relation_type.is_defined_in_content())
        {
            let mut row = relation.clone();
            row.source_id = *source;
            row.insert(conn)?;
        }
        Ok(())
    }

    /// Replace the content-derived relations of a source
    pub fn replace_derived(
        conn: &Connection,
        source: &StructureId,
        relations: &[RelationRow],
    ) -> Result<()> {
        conn.execute(
            "DELETE FROM relations WHERE source_id = ?1 AND type IN ('hyperlink', 'embedded')",
            [source.to_string()],
        )?;
        for relation in relations
            .iter()
            .filter(|r| r.relation_type.is_defined_in_content())
        {
            let mut row = relation.clone();
            row.source_id = *source;
            row.insert(conn)?;
        }
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            source_id: parse_column(row, 1)?,
            target_id: parse_optional_column(row, 2)?,
            target_path: row.get(3)?,
            relation_type: parse_column(row, 4)?,
        })
    }
}
