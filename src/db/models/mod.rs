// src/db/models/mod.rs

//! Data models for repository tables
//!
//! Each struct corresponds to a table and provides methods for creating,
//! reading, updating and deleting rows.

mod ace;
mod content;
mod link;
mod lock;
mod principal;
mod property;
mod relation;
mod resource;

pub use ace::AceEntry;
pub use content::{Content, sha256_hex};
pub use link::LinkRow;
pub use lock::{LockEntry, LockKind};
pub use principal::{Principal, PrincipalKind};
pub use property::PropertyEntry;
pub use relation::RelationRow;
pub use resource::Resource;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use std::str::FromStr;

/// Read a text column and parse it with `FromStr`
pub(crate) fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| conversion_error(idx, e))
}

/// Read an optional text column and parse it with `FromStr`
pub(crate) fn parse_optional_column<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| t.parse::<T>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Read an RFC 3339 timestamp column
pub(crate) fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{AccessControlEntry, PermissionSet};
    use crate::db;
    use crate::relation::RelationType;
    use crate::resource::{ResourceId, ResourceMetadata, ResourceState, ResourceType, StructureId};
    use rusqlite::Connection;
    use std::collections::BTreeMap;

    fn create_test_db() -> Connection {
        db::open_in_memory().unwrap()
    }

    fn file(path: &str) -> Resource {
        Resource::new(
            StructureId::new(),
            ResourceId::new(),
            path.to_string(),
            ResourceType::Plain,
            ResourceMetadata::now("admin"),
        )
    }

    #[test]
    fn test_resource_crud() {
        let conn = create_test_db();

        let res = file("/sites/default/index.html");
        res.insert(&conn).unwrap();

        let found = Resource::find_by_id(&conn, &res.structure_id).unwrap().unwrap();
        assert_eq!(found.root_path, "/sites/default/index.html");
        assert_eq!(found.state, ResourceState::New);
        assert_eq!(found.resource_type, ResourceType::Plain);

        let by_path = Resource::find_by_path(&conn, "/sites/default/index.html")
            .unwrap()
            .unwrap();
        assert_eq!(by_path.structure_id, res.structure_id);

        Resource::delete(&conn, &res.structure_id).unwrap();
        assert!(Resource::find_by_id(&conn, &res.structure_id).unwrap().is_none());
    }

    #[test]
    fn test_subtree_and_move() {
        let conn = create_test_db();

        let mut folder = file("/a");
        folder.resource_type = ResourceType::Folder;
        folder.insert(&conn).unwrap();
        file("/a/x.html").insert(&conn).unwrap();
        file("/a/b/y.html").insert(&conn).unwrap();
        file("/ab/z.html").insert(&conn).unwrap();

        let subtree = Resource::list_subtree(&conn, "/a").unwrap();
        let paths: Vec<_> = subtree.iter().map(|r| r.root_path.as_str()).collect();
        assert_eq!(paths, vec!["/a", "/a/b/y.html", "/a/x.html"]);

        Resource::move_subtree(&conn, "/a", "/c").unwrap();
        assert!(Resource::find_by_path(&conn, "/c/b/y.html").unwrap().is_some());
        assert!(Resource::find_by_path(&conn, "/ab/z.html").unwrap().is_some());
        assert!(Resource::find_by_path(&conn, "/a/x.html").unwrap().is_none());
    }

    #[test]
    fn test_content_and_siblings() {
        let conn = create_test_db();

        let first = file("/one.txt");
        let mut second = file("/two.txt");
        second.resource_id = first.resource_id;
        first.insert(&conn).unwrap();
        second.insert(&conn).unwrap();

        Content::write(&conn, &first.resource_id, b"shared").unwrap();
        let content = Content::find(&conn, &first.resource_id).unwrap().unwrap();
        assert_eq!(content.data, b"shared");
        assert_eq!(content.size, 6);

        let siblings = Resource::find_by_resource_id(&conn, &first.resource_id).unwrap();
        assert_eq!(siblings.len(), 2);
        assert_eq!(Resource::count_siblings(&conn, &first.resource_id).unwrap(), 2);
    }

    #[test]
    fn test_properties_and_acl_replace() {
        let conn = create_test_db();
        let res = file("/p.html");
        res.insert(&conn).unwrap();

        let mut props = BTreeMap::new();
        props.insert("Title".to_string(), "Home".to_string());
        PropertyEntry::replace_all(&conn, &res.structure_id, &props).unwrap();
        props.clear();
        props.insert("Description".to_string(), "d".to_string());
        PropertyEntry::replace_all(&conn, &res.structure_id, &props).unwrap();
        assert_eq!(PropertyEntry::map_for(&conn, &res.structure_id).unwrap(), props);

        let acl = vec![AccessControlEntry::new("GROUP:Users", PermissionSet::new(1, 4))];
        AceEntry::replace_all(&conn, &res.structure_id, &acl).unwrap();
        assert_eq!(AceEntry::list_for(&conn, &res.structure_id).unwrap(), acl);
    }

    #[test]
    fn test_relations_replace_recorded_only() {
        let conn = create_test_db();
        let res = file("/r.html");
        res.insert(&conn).unwrap();

        let mut link = RelationRow::new(res.structure_id, None, "/x".to_string(), RelationType::Hyperlink);
        link.insert(&conn).unwrap();
        let mut cat = RelationRow::new(res.structure_id, None, "/cat/a".to_string(), RelationType::Category);
        cat.insert(&conn).unwrap();

        RelationRow::replace_recorded(&conn, &res.structure_id, &[]).unwrap();
        let left = RelationRow::list_for(&conn, &res.structure_id).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].relation_type, RelationType::Hyperlink);
    }

    #[test]
    fn test_principals() {
        let conn = create_test_db();
        let mut group = Principal::new("Users".to_string(), PrincipalKind::Group);
        group.insert(&conn).unwrap();
        let mut user = Principal::new("editor".to_string(), PrincipalKind::User);
        user.password_digest = Some("X03MO1qnZdYdgyfeuILPmQ==".to_string());
        user.insert(&conn).unwrap();
        Principal::add_member(&conn, "Users", "editor").unwrap();

        let found = Principal::find(&conn, "editor").unwrap().unwrap();
        assert_eq!(found.kind, PrincipalKind::User);
        assert_eq!(Principal::groups_of(&conn, "editor").unwrap(), vec!["Users".to_string()]);
        assert_eq!(Principal::list_all(&conn).unwrap().len(), 2);
    }
}
