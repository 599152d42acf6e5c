// src/relation.rs

//! Relations between resources
//!
//! Relations come from two places. Hyperlinks and embedded references are
//! derived by parsing structured content and are regenerated whenever that
//! content is parsed again. Categories and manually assigned relations exist
//! only as repository data, so an archive has to record them and the importer
//! replays them once the source resource exists.

use crate::resource::StructureId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    /// `<a href>`-style link found in content
    Hyperlink,
    /// Image or other embedded reference found in content
    Embedded,
    /// Category assignment
    Category,
    /// Relation set by hand
    Manual,
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            RelationType::Hyperlink => "hyperlink",
            RelationType::Embedded => "embedded",
            RelationType::Category => "category",
            RelationType::Manual => "manual",
        }
    }

    /// Whether parsing the source content recreates this relation
    pub fn is_defined_in_content(&self) -> bool {
        matches!(self, RelationType::Hyperlink | RelationType::Embedded)
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hyperlink" => Ok(RelationType::Hyperlink),
            "embedded" => Ok(RelationType::Embedded),
            "category" => Ok(RelationType::Category),
            "manual" => Ok(RelationType::Manual),
            _ => Err(format!("Invalid relation type: {s}")),
        }
    }
}

/// A relation as recorded in an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEntry {
    /// Target structure id at export time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<StructureId>,
    /// Target root path at export time
    pub target_path: String,
    pub relation_type: RelationType,
}

impl RelationEntry {
    pub fn new(target_id: Option<StructureId>, target_path: &str, relation_type: RelationType) -> Self {
        Self {
            target_id,
            target_path: target_path.to_string(),
            relation_type,
        }
    }
}

/// Relations of an entry that the importer must replay itself
pub fn recorded(relations: &[RelationEntry]) -> impl Iterator<Item = &RelationEntry> {
    relations
        .iter()
        .filter(|r| !r.relation_type.is_defined_in_content())
}
