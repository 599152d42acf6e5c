// src/repository/mod.rs

//! The live content repository
//!
//! `Repository` wraps the SQLite connection and exposes the operations the
//! import and export engine needs: lookup by structure id or path, creation
//! of folders, files and siblings, content writes, moves, sibling-aware
//! deletion, locking and publishing.
//!
//! Mutating methods never open their own transaction. Callers that need a
//! group of writes to land together wrap them in [`Repository::atomically`],
//! which nests through SQLite savepoints.

mod lock;

pub use lock::EntryLock;

use crate::acl::AccessControlEntry;
use crate::db;
use crate::db::models::{
    AceEntry, Content, LinkRow, LockEntry, LockKind, Principal, PropertyEntry, RelationRow,
    Resource,
};
use crate::error::{Error, Result};
use crate::path;
use crate::relation::RelationType;
use crate::resource::{ResourceId, ResourceMetadata, ResourceState, ResourceType, StructureId};
use rusqlite::Connection;
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// What happens to the other siblings when a resource is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingMode {
    /// Delete only this path; shared content stays while any sibling remains
    Preserve,
    /// Delete every sibling of the resource together with its content
    Remove,
}

/// Everything stored for one resource, read at a single point in time
#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub resource: Resource,
    pub content: Option<Content>,
    pub properties: BTreeMap<String, String>,
    pub acl: Vec<AccessControlEntry>,
    pub relations: Vec<RelationRow>,
}

pub struct Repository {
    conn: Connection,
    savepoint_depth: Cell<u32>,
}

impl Repository {
    /// Create a repository database at `db_path`
    pub fn init(db_path: &str) -> Result<Self> {
        db::init(db_path)?;
        Self::open(db_path)
    }

    /// Open an existing repository database
    pub fn open(db_path: &str) -> Result<Self> {
        Ok(Self::from_connection(db::open(db_path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            savepoint_depth: Cell::new(0),
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` so that either all of its writes land or none do
    pub fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let depth = self.savepoint_depth.get();
        let name = format!("vfsport_sp{depth}");
        self.conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        self.savepoint_depth.set(depth + 1);

        let outcome = f();
        self.savepoint_depth.set(depth);

        match outcome {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {name}"))?;
                Ok(value)
            }
            Err(e) => {
                self.conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
                Err(e)
            }
        }
    }

    pub fn resource_by_id(&self, id: &StructureId) -> Result<Option<Resource>> {
        Resource::find_by_id(&self.conn, id)
    }

    pub fn resource_by_path(&self, root_path: &str) -> Result<Option<Resource>> {
        Resource::find_by_path(&self.conn, root_path)
    }

    /// Read a resource that must exist
    pub fn read_resource(&self, root_path: &str) -> Result<Resource> {
        self.resource_by_path(root_path)?
            .ok_or_else(|| Error::NotFoundError(format!("resource {root_path}")))
    }

    /// The resource at `root_path` and everything below it, in path order
    pub fn list(&self, root_path: &str) -> Result<Vec<Resource>> {
        Resource::list_subtree(&self.conn, root_path)
    }

    pub fn children(&self, folder: &str) -> Result<Vec<Resource>> {
        Resource::list_children(&self.conn, folder)
    }

    /// All path instances backed by `id`
    pub fn siblings(&self, id: &ResourceId) -> Result<Vec<Resource>> {
        Resource::find_by_resource_id(&self.conn, id)
    }

    /// Create every missing folder on the way to `folder`, including itself
    ///
    /// Returns the paths that were created.
    pub fn ensure_folders(&self, folder: &str, user: &str) -> Result<Vec<String>> {
        let folder = path::sanitize(folder)?;
        if folder == "/" {
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        let mut chain = path::ancestors(&folder);
        chain.push(&folder);
        for current in chain {
            match self.resource_by_path(current)? {
                Some(existing) if existing.is_folder() => {}
                Some(existing) => {
                    return Err(Error::EntryConflict {
                        path: current.to_string(),
                        reason: format!("expected a folder, found {}", existing.resource_type),
                    });
                }
                None => {
                    Resource::new(
                        StructureId::new(),
                        ResourceId::new(),
                        current.to_string(),
                        ResourceType::Folder,
                        ResourceMetadata::now(user),
                    )
                    .insert(&self.conn)?;
                    debug!("Created folder {}", current);
                    created.push(current.to_string());
                }
            }
        }
        Ok(created)
    }

    /// Insert a resource row after checking its path and parent
    pub fn create_resource(&self, resource: &Resource) -> Result<()> {
        let target = path::sanitize(&resource.root_path)?;
        if target != resource.root_path {
            return Err(Error::InvalidPath(resource.root_path.clone()));
        }
        if let Some(existing) = self.resource_by_path(&target)? {
            return Err(Error::EntryConflict {
                path: target,
                reason: format!("path is occupied by {}", existing.structure_id),
            });
        }
        self.require_parent_folder(&target)?;
        resource.insert(&self.conn)
    }

    /// Create a file with fresh ids, creating missing parent folders
    pub fn create_file(
        &self,
        root_path: &str,
        resource_type: ResourceType,
        data: &[u8],
        user: &str,
    ) -> Result<Resource> {
        let root_path = path::sanitize(root_path)?;
        if resource_type.is_folder() {
            return Err(Error::InvalidPath(format!("{root_path} is not a file path")));
        }
        self.atomically(|| {
            if let Some(parent) = path::parent(&root_path) {
                self.ensure_folders(parent, user)?;
            }
            let resource = Resource::new(
                StructureId::new(),
                ResourceId::new(),
                root_path.clone(),
                resource_type,
                ResourceMetadata::now(user),
            );
            self.create_resource(&resource)?;
            Content::write(&self.conn, &resource.resource_id, data)?;
            Ok(resource)
        })
    }

    /// Create a new path instance sharing the content of `source`
    pub fn create_sibling(&self, source: &str, root_path: &str, user: &str) -> Result<Resource> {
        let source = self.read_resource(source)?;
        if source.is_folder() {
            return Err(Error::EntryConflict {
                path: source.root_path,
                reason: "folders cannot have siblings".to_string(),
            });
        }
        let root_path = path::sanitize(root_path)?;
        self.atomically(|| {
            if let Some(parent) = path::parent(&root_path) {
                self.ensure_folders(parent, user)?;
            }
            let sibling = Resource::new(
                StructureId::new(),
                source.resource_id,
                root_path.clone(),
                source.resource_type,
                ResourceMetadata::now(user),
            );
            self.create_resource(&sibling)?;
            Ok(sibling)
        })
    }

    /// Store every column of an existing resource row
    pub fn update_resource(&self, resource: &Resource) -> Result<()> {
        resource.update(&self.conn)
    }

    pub fn content(&self, id: &ResourceId) -> Result<Option<Content>> {
        Content::find(&self.conn, id)
    }

    /// Replace the content shared by every sibling of `id`
    pub fn write_content(&self, id: &ResourceId, data: &[u8]) -> Result<()> {
        Content::write(&self.conn, id, data)?;
        Ok(())
    }

    pub fn has_content(&self, id: &ResourceId) -> Result<bool> {
        Content::exists(&self.conn, id)
    }

    /// Delete the content of `id` if no structure row references it any more
    pub fn release_content(&self, id: &ResourceId) -> Result<bool> {
        if Resource::count_siblings(&self.conn, id)? > 0 {
            return Ok(false);
        }
        Content::delete(&self.conn, id)?;
        Ok(true)
    }

    /// Move a resource (and, for folders, its subtree) to `new_path`
    pub fn move_resource(&self, id: &StructureId, new_path: &str) -> Result<Resource> {
        let resource = self
            .resource_by_id(id)?
            .ok_or_else(|| Error::NotFoundError(format!("structure {id}")))?;
        let new_path = path::sanitize(new_path)?;
        if resource.root_path == new_path {
            return Ok(resource);
        }
        if path::is_under(&new_path, &resource.root_path) {
            return Err(Error::InvalidPath(format!(
                "cannot move {} below itself",
                resource.root_path
            )));
        }
        if self.resource_by_path(&new_path)?.is_some() {
            return Err(Error::EntryConflict {
                path: new_path,
                reason: "move target is occupied".to_string(),
            });
        }
        self.require_parent_folder(&new_path)?;

        let moved = Resource::move_subtree(&self.conn, &resource.root_path, &new_path)?;
        debug!("Moved {} -> {} ({} rows)", resource.root_path, new_path, moved);
        self.resource_by_id(id)?
            .ok_or_else(|| Error::NotFoundError(format!("structure {id}")))
    }

    /// Delete a resource, returning the number of structure rows removed
    ///
    /// Folders take their whole subtree with them. Content is removed once no
    /// structure row references its resource id any more.
    pub fn delete_resource(&self, id: &StructureId, mode: SiblingMode) -> Result<usize> {
        let resource = self
            .resource_by_id(id)?
            .ok_or_else(|| Error::NotFoundError(format!("structure {id}")))?;

        self.atomically(|| {
            let mut doomed = self.list(&resource.root_path)?;
            if mode == SiblingMode::Remove {
                let mut extra = Vec::new();
                for r in doomed.iter().filter(|r| !r.is_folder()) {
                    extra.extend(self.siblings(&r.resource_id)?);
                }
                doomed.extend(extra);
            }

            let mut removed_ids = BTreeSet::new();
            let mut touched_contents = BTreeSet::new();
            // Deepest paths first so folders never outlive their children
            doomed.sort_by(|a, b| b.root_path.cmp(&a.root_path));
            for r in &doomed {
                if removed_ids.insert(r.structure_id) {
                    Resource::delete(&self.conn, &r.structure_id)?;
                    touched_contents.insert(r.resource_id);
                }
            }

            for content_id in &touched_contents {
                self.release_content(content_id)?;
            }

            debug!(
                "Deleted {} ({} rows, siblings {:?})",
                resource.root_path,
                removed_ids.len(),
                mode
            );
            Ok(removed_ids.len())
        })
    }

    pub fn properties(&self, id: &StructureId) -> Result<BTreeMap<String, String>> {
        PropertyEntry::map_for(&self.conn, id)
    }

    pub fn set_properties(&self, id: &StructureId, props: &BTreeMap<String, String>) -> Result<()> {
        PropertyEntry::replace_all(&self.conn, id, props)
    }

    pub fn acl(&self, id: &StructureId) -> Result<Vec<AccessControlEntry>> {
        AceEntry::list_for(&self.conn, id)
    }

    pub fn set_acl(&self, id: &StructureId, entries: &[AccessControlEntry]) -> Result<()> {
        AceEntry::replace_all(&self.conn, id, entries)
    }

    pub fn relations(&self, id: &StructureId) -> Result<Vec<RelationRow>> {
        RelationRow::list_for(&self.conn, id)
    }

    /// Record a relation from `source` to `target`
    pub fn add_relation(
        &self,
        source: &StructureId,
        target: &Resource,
        relation_type: RelationType,
    ) -> Result<()> {
        RelationRow::new(
            *source,
            Some(target.structure_id),
            target.root_path.clone(),
            relation_type,
        )
        .insert(&self.conn)?;
        Ok(())
    }

    pub fn replace_recorded_relations(
        &self,
        source: &StructureId,
        relations: &[RelationRow],
    ) -> Result<()> {
        RelationRow::replace_recorded(&self.conn, source, relations)
    }

    /// Store a freshly parsed link table and the relations derived from it
    pub fn store_links(&self, source: &StructureId, links: &[LinkRow]) -> Result<()> {
        let derived: Vec<RelationRow> = links
            .iter()
            .filter_map(|link| {
                link.target_id.map(|target| {
                    RelationRow::new(*source, Some(target), link.raw_target.clone(), link.kind)
                })
            })
            .collect();
        LinkRow::replace_for(&self.conn, source, links)?;
        RelationRow::replace_derived(&self.conn, source, &derived)
    }

    pub fn links(&self, id: &StructureId) -> Result<Vec<LinkRow>> {
        LinkRow::list_for(&self.conn, id)
    }

    pub fn lock_of(&self, id: &StructureId) -> Result<Option<LockEntry>> {
        LockEntry::find(&self.conn, id)
    }

    /// Take a working lock on a resource for `owner`
    pub fn lock_resource(&self, root_path: &str, owner: &str) -> Result<()> {
        let resource = self.read_resource(root_path)?;
        if let Some(lock) = self.lock_of(&resource.structure_id)?
            && !lock.is_owned_by(owner)
        {
            return Err(Error::LockConflict {
                path: resource.root_path,
                owner: lock.owner,
            });
        }
        LockEntry::new(resource.structure_id, owner, LockKind::Working).set(&self.conn)
    }

    /// Release every lock held by `owner`
    pub fn release_locks(&self, owner: &str) -> Result<usize> {
        LockEntry::release_owned_by(&self.conn, owner)
    }

    /// Mark a subtree as published and drop its working locks
    pub fn publish(&self, root_path: &str) -> Result<usize> {
        let subtree = self.list(root_path)?;
        if subtree.is_empty() {
            return Err(Error::NotFoundError(format!("resource {root_path}")));
        }
        self.atomically(|| {
            let mut published = 0;
            for resource in &subtree {
                if let Some(lock) = self.lock_of(&resource.structure_id)? {
                    if lock.kind == LockKind::Exclusive {
                        return Err(Error::LockConflict {
                            path: resource.root_path.clone(),
                            owner: lock.owner,
                        });
                    }
                    LockEntry::delete(&self.conn, &resource.structure_id)?;
                }
                if resource.state != ResourceState::Unchanged {
                    Resource::set_state(&self.conn, &resource.structure_id, ResourceState::Unchanged)?;
                    published += 1;
                }
            }
            info!("Published {} resource(s) under {}", published, root_path);
            Ok(published)
        })
    }

    /// Read a resource and everything attached to it in one transaction
    pub fn snapshot(&self, id: &StructureId) -> Result<ResourceSnapshot> {
        self.atomically(|| {
            let resource = self
                .resource_by_id(id)?
                .ok_or_else(|| Error::NotFoundError(format!("structure {id}")))?;
            let content = if resource.is_folder() {
                None
            } else {
                self.content(&resource.resource_id)?
            };
            Ok(ResourceSnapshot {
                properties: self.properties(id)?,
                acl: self.acl(id)?,
                relations: self.relations(id)?,
                content,
                resource,
            })
        })
    }

    pub fn principal(&self, name: &str) -> Result<Option<Principal>> {
        Principal::find(&self.conn, name)
    }

    pub fn principals(&self) -> Result<Vec<Principal>> {
        Principal::list_all(&self.conn)
    }

    pub fn groups_of(&self, name: &str) -> Result<Vec<String>> {
        Principal::groups_of(&self.conn, name)
    }

    /// Insert a principal; fails if the name is taken
    pub fn create_principal(&self, principal: &mut Principal) -> Result<()> {
        if self.principal(&principal.name)?.is_some() {
            return Err(Error::EntryConflict {
                path: principal.name.clone(),
                reason: "principal already exists".to_string(),
            });
        }
        principal.insert(&self.conn)
    }

    pub fn add_group_member(&self, group: &str, user: &str) -> Result<()> {
        Principal::add_member(&self.conn, group, user)
    }

    fn require_parent_folder(&self, root_path: &str) -> Result<()> {
        let Some(parent) = path::parent(root_path) else {
            return Ok(());
        };
        if parent == "/" {
            return Ok(());
        }
        match self.resource_by_path(parent)? {
            Some(p) if p.is_folder() => Ok(()),
            Some(p) => Err(Error::EntryConflict {
                path: root_path.to_string(),
                reason: format!("parent {} is a {}", p.root_path, p.resource_type),
            }),
            None => Err(Error::NotFoundError(format!("parent folder {parent}"))),
        }
    }
}
