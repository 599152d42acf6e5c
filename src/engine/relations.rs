// src/engine/relations.rs

//! Relation replay after materialization
//!
//! Relations recorded in the archive are stored again once every entry is in
//! place, since their targets may come later in the archive. Targets resolve
//! the same way link targets do, with the live repository as a last resort. Relations defined by content (hyperlinks and
//! embedded resources) are not replayed here; they are rebuilt from the
//! content during link fixup.
//!
//! A relation whose target cannot be found is dropped with a warning. It
//! never fails the entry that carries it.

use super::session::Materialized;
use crate::db::models::RelationRow;
use crate::error::Result;
use crate::links::{LinkResolver, LinkTableEntry, LinkTarget};
use crate::relation;
use crate::repository::Repository;
use tracing::{debug, warn};

/// Totals of one replay pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationReplay {
    pub stored: usize,
    pub warnings: Vec<String>,
}

/// Replace the recorded relations of every materialized entry
pub fn replay(
    repo: &Repository,
    resolver: &LinkResolver<'_>,
    materialized: &[Materialized],
) -> Result<RelationReplay> {
    let mut replay = RelationReplay::default();

    for item in materialized {
        let source = &item.resource;
        let mut rows = Vec::new();
        for entry in relation::recorded(&item.relations) {
            let probe = LinkTableEntry {
                element: entry.relation_type.as_str().to_string(),
                target: entry.target_path.clone(),
                target_id: entry.target_id,
                relation_type: entry.relation_type,
            };
            let (target_id, target_path) = match resolver.resolve_live(&probe)? {
                LinkTarget::Session(found) => (found.structure_id, found.root_path),
                LinkTarget::Repository(live) => (live.structure_id, live.root_path),
                LinkTarget::External | LinkTarget::Broken => {
                    warn!(
                        "Dropping {} relation {} -> {}: target not found",
                        entry.relation_type, source.root_path, entry.target_path
                    );
                    replay.warnings.push(format!(
                        "{}: {} relation to {} not found",
                        source.root_path, entry.relation_type, entry.target_path
                    ));
                    continue;
                }
            };
            rows.push(RelationRow::new(
                source.structure_id,
                Some(target_id),
                target_path,
                entry.relation_type,
            ));
        }

        repo.replace_recorded_relations(&source.structure_id, &rows)?;
        debug!("{}: {} recorded relation(s)", source.root_path, rows.len());
        replay.stored += rows.len();
    }

    Ok(replay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::SessionTarget;
    use crate::relation::{RelationEntry, RelationType};
    use crate::resource::{ResourceType, StructureId};
    use crate::translator::ResourceTranslator;
    use std::collections::HashMap;

    #[test]
    fn test_replay_replaces_recorded_relations() {
        let repo = Repository::open_in_memory().unwrap();
        let page = repo.create_file("/site/page.html", ResourceType::Plain, b"", "admin").unwrap();
        let category = repo.create_file("/cats/news", ResourceType::Plain, b"", "admin").unwrap();
        let stale = repo.create_file("/cats/old", ResourceType::Plain, b"", "admin").unwrap();
        repo.add_relation(&page.structure_id, &stale, RelationType::Category).unwrap();
        repo.add_relation(&page.structure_id, &category, RelationType::Hyperlink).unwrap();

        let imported = repo.create_file("/site/other.html", ResourceType::Plain, b"", "admin").unwrap();
        let archive_id = StructureId::new();
        let by_id = HashMap::from([(
            archive_id,
            SessionTarget {
                structure_id: imported.structure_id,
                root_path: imported.root_path.clone(),
            },
        )]);
        let by_path = HashMap::new();
        let translator = ResourceTranslator::identity();
        let resolver = LinkResolver::new(&repo, &translator, "/old", &by_id, &by_path);

        let materialized = vec![Materialized {
            archive_id: StructureId::new(),
            relations: vec![
                RelationEntry::new(None, "/cats/news", RelationType::Category),
                RelationEntry::new(Some(archive_id), "/old/other.html", RelationType::Manual),
                RelationEntry::new(None, "/cats/missing", RelationType::Category),
                // Content-defined; rebuilt by link fixup instead
                RelationEntry::new(None, "/cats/news", RelationType::Hyperlink),
            ],
            resource: page.clone(),
        }];

        let replay = replay(&repo, &resolver, &materialized).unwrap();
        assert_eq!(replay.stored, 2);
        assert_eq!(replay.warnings.len(), 1);

        let rows = repo.relations(&page.structure_id).unwrap();
        let mut kinds: Vec<_> = rows
            .iter()
            .map(|r| (r.relation_type, r.target_path.as_str()))
            .collect();
        kinds.sort_by_key(|(t, p)| (t.as_str().to_string(), p.to_string()));
        assert_eq!(
            kinds,
            vec![
                (RelationType::Category, "/cats/news"),
                (RelationType::Hyperlink, "/cats/news"),
                (RelationType::Manual, "/site/other.html"),
            ]
        );
    }
}
