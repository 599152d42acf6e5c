// src/engine/identity.rs

//! Identity resolution for incoming archive entries
//!
//! An entry is matched against the live repository twice: by structure id
//! and by its translated target path. The combination decides what the
//! importer does:
//!
//! | by id | by path          | decision                                   |
//! |-------|------------------|--------------------------------------------|
//! | none  | none             | create                                     |
//! | R     | R                | overwrite R in place                       |
//! | R     | none             | overwrite R, moving it to the target path  |
//! | none  | P                | overwrite P, keeping P's structure id      |
//! | R     | P (different)    | conflict, or evict P and move R            |
//!
//! A folder never turns into a file (or the other way round) in place; that
//! is a conflict unless collisions may be overwritten, in which case the old
//! resource is evicted. Locks held by anyone but the session or the
//! configured lock owner are a conflict no option can override; for a folder
//! that would be evicted or moved, that covers every resource below it.

use crate::db::models::Resource;
use crate::error::{Error, Result};
use crate::manifest::ManifestEntry;
use crate::repository::Repository;
use crate::resource::ResourceType;
use tracing::debug;

/// What to do with one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing matches; create a new resource with the archive's ids
    Create,
    /// Update an existing resource, moving it to the target path if needed
    Overwrite(Resource),
    /// Delete `evict` first, then overwrite `keep` or create
    Replace {
        evict: Vec<Resource>,
        keep: Option<Resource>,
    },
}

impl Decision {
    pub fn as_str(&self) -> &str {
        match self {
            Decision::Create => "create",
            Decision::Overwrite(_) => "overwrite",
            Decision::Replace { .. } => "replace",
        }
    }

    /// Every live resource this decision modifies or deletes
    pub fn touched(&self) -> Vec<&Resource> {
        match self {
            Decision::Create => Vec::new(),
            Decision::Overwrite(existing) => vec![existing],
            Decision::Replace { evict, keep } => evict.iter().chain(keep.iter()).collect(),
        }
    }

    /// The live resource that survives and takes the entry's data
    pub fn kept(&self) -> Option<&Resource> {
        match self {
            Decision::Create => None,
            Decision::Overwrite(existing) => Some(existing),
            Decision::Replace { keep, .. } => keep.as_ref(),
        }
    }

    pub fn evicted(&self) -> &[Resource] {
        match self {
            Decision::Replace { evict, .. } => evict,
            _ => &[],
        }
    }

    /// Whether an existing resource is replaced, as opposed to a fresh create
    pub fn replaces_existing(&self) -> bool {
        !matches!(self, Decision::Create)
    }
}

/// Matches archive entries against the live repository
pub struct IdentityResolver<'a> {
    repo: &'a Repository,
    session_id: &'a str,
    lock_owner: &'a str,
    overwrite_collisions: bool,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(
        repo: &'a Repository,
        session_id: &'a str,
        lock_owner: &'a str,
        overwrite_collisions: bool,
    ) -> Self {
        Self {
            repo,
            session_id,
            lock_owner,
            overwrite_collisions,
        }
    }

    /// Decide how `entry` lands at `target_path`
    pub fn resolve(&self, entry: &ManifestEntry, target_path: &str) -> Result<Decision> {
        let incoming = entry.resource_type();
        let by_id = self.repo.resource_by_id(&entry.structure_id)?;
        let by_path = self.repo.resource_by_path(target_path)?;

        for existing in by_id.iter().chain(by_path.iter()) {
            self.check_lock(existing)?;
        }

        let decision = match (by_id, by_path) {
            (None, None) => Decision::Create,
            (Some(found), Some(occupant)) if found.structure_id == occupant.structure_id => {
                self.reuse(found, incoming, target_path)?
            }
            (Some(found), Some(occupant)) => {
                if !self.overwrite_collisions {
                    return Err(Error::EntryConflict {
                        path: target_path.to_string(),
                        reason: format!(
                            "structure id {} belongs to {} but the path holds {}",
                            found.structure_id, found.root_path, occupant.structure_id
                        ),
                    });
                }
                if same_kind(&found, incoming) {
                    Decision::Replace {
                        evict: vec![occupant],
                        keep: Some(found),
                    }
                } else {
                    Decision::Replace {
                        evict: vec![occupant, found],
                        keep: None,
                    }
                }
            }
            (Some(found), None) | (None, Some(found)) => self.reuse(found, incoming, target_path)?,
        };

        // Evicting or relocating a folder takes its subtree along
        let relocated = decision.kept().filter(|kept| kept.root_path != target_path);
        for moved in decision.evicted().iter().chain(relocated) {
            if moved.is_folder() {
                for descendant in self.repo.list(&moved.root_path)? {
                    self.check_lock(&descendant)?;
                }
            }
        }

        debug!("{} -> {} ({})", entry.path, target_path, decision.as_str());
        Ok(decision)
    }

    fn reuse(&self, existing: Resource, incoming: ResourceType, target_path: &str) -> Result<Decision> {
        if same_kind(&existing, incoming) {
            Ok(Decision::Overwrite(existing))
        } else if self.overwrite_collisions {
            Ok(Decision::Replace {
                evict: vec![existing],
                keep: None,
            })
        } else {
            Err(Error::EntryConflict {
                path: target_path.to_string(),
                reason: format!(
                    "cannot replace {} {} with a {}",
                    existing.resource_type, existing.root_path, incoming
                ),
            })
        }
    }

    fn check_lock(&self, resource: &Resource) -> Result<()> {
        if let Some(lock) = self.repo.lock_of(&resource.structure_id)?
            && !lock.is_owned_by(self.session_id)
            && !lock.is_owned_by(self.lock_owner)
        {
            return Err(Error::LockConflict {
                path: resource.root_path.clone(),
                owner: lock.owner,
            });
        }
        Ok(())
    }
}

fn same_kind(existing: &Resource, incoming: ResourceType) -> bool {
    existing.is_folder() == incoming.is_folder()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceId, StructureId};
    use std::collections::BTreeMap;

    fn entry(path: &str, structure_id: StructureId, resource_type: ResourceType) -> ManifestEntry {
        ManifestEntry {
            path: path.to_string(),
            structure_id,
            resource_id: ResourceId::new(),
            resource_type: resource_type.as_str().to_string(),
            properties: BTreeMap::new(),
            acl: Vec::new(),
            relations: Vec::new(),
            metadata: None,
            content: None,
        }
    }

    #[test]
    fn test_decisions() {
        let repo = Repository::open_in_memory().unwrap();
        let a = repo.create_file("/site/a.html", ResourceType::Plain, b"a", "admin").unwrap();
        let b = repo.create_file("/site/b.html", ResourceType::Plain, b"b", "admin").unwrap();
        let resolver = IdentityResolver::new(&repo, "s1", "admin", false);

        let fresh = entry("/c.html", StructureId::new(), ResourceType::Plain);
        assert_eq!(resolver.resolve(&fresh, "/site/c.html").unwrap(), Decision::Create);

        let same = entry("/a.html", a.structure_id, ResourceType::XmlContent);
        assert_eq!(
            resolver.resolve(&same, "/site/a.html").unwrap(),
            Decision::Overwrite(a.clone())
        );

        let moved = entry("/moved.html", a.structure_id, ResourceType::Plain);
        assert_eq!(
            resolver.resolve(&moved, "/site/moved.html").unwrap(),
            Decision::Overwrite(a.clone())
        );

        let by_path = entry("/b.html", StructureId::new(), ResourceType::Plain);
        assert_eq!(
            resolver.resolve(&by_path, "/site/b.html").unwrap(),
            Decision::Overwrite(b.clone())
        );

        let dual = entry("/b.html", a.structure_id, ResourceType::Plain);
        assert!(matches!(
            resolver.resolve(&dual, "/site/b.html"),
            Err(Error::EntryConflict { .. })
        ));

        let overwriting = IdentityResolver::new(&repo, "s1", "admin", true);
        assert_eq!(
            overwriting.resolve(&dual, "/site/b.html").unwrap(),
            Decision::Replace {
                evict: vec![b],
                keep: Some(a)
            }
        );
    }

    #[test]
    fn test_folder_file_mismatch() {
        let repo = Repository::open_in_memory().unwrap();
        repo.ensure_folders("/site/docs", "admin").unwrap();
        let folder = repo.read_resource("/site/docs").unwrap();

        let file = entry("/docs", StructureId::new(), ResourceType::Plain);
        let strict = IdentityResolver::new(&repo, "s1", "admin", false);
        assert!(matches!(
            strict.resolve(&file, "/site/docs"),
            Err(Error::EntryConflict { .. })
        ));

        let lenient = IdentityResolver::new(&repo, "s1", "admin", true);
        let decision = lenient.resolve(&file, "/site/docs").unwrap();
        assert_eq!(decision.evicted(), &[folder]);
        assert!(decision.kept().is_none());
    }

    #[test]
    fn test_foreign_lock_is_never_overridden() {
        let repo = Repository::open_in_memory().unwrap();
        let a = repo.create_file("/site/a.html", ResourceType::Plain, b"a", "admin").unwrap();
        repo.lock_resource("/site/a.html", "editor").unwrap();

        let incoming = entry("/a.html", a.structure_id, ResourceType::Plain);
        for overwrite in [false, true] {
            let resolver = IdentityResolver::new(&repo, "s1", "admin", overwrite);
            assert!(matches!(
                resolver.resolve(&incoming, "/site/a.html"),
                Err(Error::LockConflict { owner, .. }) if owner == "editor"
            ));
        }

        // The configured lock owner's own locks are fine
        let resolver = IdentityResolver::new(&repo, "s1", "editor", false);
        assert!(resolver.resolve(&incoming, "/site/a.html").is_ok());
    }

    #[test]
    fn test_locks_below_a_moved_or_evicted_folder() {
        let repo = Repository::open_in_memory().unwrap();
        repo.create_file("/site/docs/x.txt", ResourceType::Plain, b"x", "admin").unwrap();
        repo.lock_resource("/site/docs/x.txt", "editor").unwrap();
        let docs = repo.read_resource("/site/docs").unwrap();
        let resolver = IdentityResolver::new(&repo, "s1", "admin", true);

        let file = entry("/docs", StructureId::new(), ResourceType::Plain);
        assert!(matches!(
            resolver.resolve(&file, "/site/docs"),
            Err(Error::LockConflict { path, .. }) if path == "/site/docs/x.txt"
        ));

        let moved = entry("/papers", docs.structure_id, ResourceType::Folder);
        assert!(matches!(
            resolver.resolve(&moved, "/site/papers"),
            Err(Error::LockConflict { .. })
        ));

        // Overwriting the folder in place leaves its children alone
        let same = entry("/docs", docs.structure_id, ResourceType::Folder);
        assert_eq!(
            resolver.resolve(&same, "/site/docs").unwrap(),
            Decision::Overwrite(docs)
        );
    }
}
