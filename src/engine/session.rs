// src/engine/session.rs

//! State of one import run
//!
//! A session owns everything that lives exactly as long as one import: its
//! id (used as the owner of exclusive entry locks), the phase, the report,
//! the sibling ledger and the archive-to-live mapping consulted by relation
//! replay and link fixup. Dropping the session releases any lock still held
//! under its id, whether the import succeeded or not.

use super::report::{ImportPhase, ImportReport};
use super::siblings::SiblingLedger;
use crate::db::models::Resource;
use crate::error::Result;
use crate::links::SessionTarget;
use crate::relation::RelationEntry;
use crate::repository::Repository;
use crate::resource::StructureId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// An entry the session wrote to the repository
#[derive(Debug, Clone)]
pub struct Materialized {
    /// Structure id the entry had in the archive
    pub archive_id: StructureId,
    /// Relations recorded for the entry in the archive
    pub relations: Vec<RelationEntry>,
    /// The live resource as last seen
    pub resource: Resource,
}

pub struct ImportSession<'a> {
    repo: &'a Repository,
    id: String,
    cancel: Arc<AtomicBool>,
    report: ImportReport,
    pub(crate) ledger: SiblingLedger,
    by_archive_id: HashMap<StructureId, SessionTarget>,
    by_archive_path: HashMap<String, SessionTarget>,
    materialized: Vec<Materialized>,
}

impl<'a> ImportSession<'a> {
    pub fn new(repo: &'a Repository, cancel: Arc<AtomicBool>) -> Self {
        let id = format!("import-{}", Uuid::new_v4());
        debug!("Starting import session {}", id);
        Self {
            repo,
            id,
            cancel,
            report: ImportReport::default(),
            ledger: SiblingLedger::new(),
            by_archive_id: HashMap::new(),
            by_archive_path: HashMap::new(),
            materialized: Vec::new(),
        }
    }

    /// Owner name of the session's exclusive locks
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> ImportPhase {
        self.report.phase
    }

    pub fn enter(&mut self, phase: ImportPhase) {
        info!("Import {}: {} -> {}", self.id, self.report.phase, phase);
        self.report.phase = phase;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> &ImportReport {
        &self.report
    }

    pub fn report_mut(&mut self) -> &mut ImportReport {
        &mut self.report
    }

    /// Remember where an archive entry ended up
    ///
    /// `key` is the entry's translated site-relative path.
    pub fn record(
        &mut self,
        archive_id: StructureId,
        key: String,
        relations: Vec<RelationEntry>,
        resource: Resource,
    ) {
        let target = SessionTarget {
            structure_id: resource.structure_id,
            root_path: resource.root_path.clone(),
        };
        self.by_archive_id.insert(archive_id, target.clone());
        self.by_archive_path.insert(key, target);
        self.materialized.push(Materialized {
            archive_id,
            relations,
            resource,
        });
    }

    /// Re-read every materialized resource
    ///
    /// Later entries may have moved or evicted earlier ones; targets that no
    /// longer exist are forgotten.
    pub fn refresh(&mut self) -> Result<()> {
        let mut live = Vec::with_capacity(self.materialized.len());
        for item in self.materialized.drain(..) {
            match self.repo.resource_by_id(&item.resource.structure_id)? {
                Some(resource) => live.push(Materialized { resource, ..item }),
                None => debug!("{} vanished during the session", item.resource.root_path),
            }
        }
        self.materialized = live;

        let current: HashMap<StructureId, String> = self
            .materialized
            .iter()
            .map(|m| (m.resource.structure_id, m.resource.root_path.clone()))
            .collect();
        for target in self
            .by_archive_id
            .values_mut()
            .chain(self.by_archive_path.values_mut())
        {
            if let Some(path) = current.get(&target.structure_id) {
                target.root_path = path.clone();
            }
        }
        self.by_archive_id.retain(|_, t| current.contains_key(&t.structure_id));
        self.by_archive_path.retain(|_, t| current.contains_key(&t.structure_id));
        Ok(())
    }

    pub fn by_archive_id(&self) -> &HashMap<StructureId, SessionTarget> {
        &self.by_archive_id
    }

    pub fn by_archive_path(&self) -> &HashMap<String, SessionTarget> {
        &self.by_archive_path
    }

    pub fn materialized(&self) -> &[Materialized] {
        &self.materialized
    }

    /// End the session and hand back its report
    pub fn finish(mut self) -> ImportReport {
        std::mem::take(&mut self.report)
    }
}

impl Drop for ImportSession<'_> {
    fn drop(&mut self) {
        match self.repo.release_locks(&self.id) {
            Ok(0) => {}
            Ok(n) => debug!("Session {} released {} lock(s)", self.id, n),
            Err(e) => warn!("Session {} failed to release its locks: {}", self.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{LockEntry, LockKind};
    use crate::resource::ResourceType;

    #[test]
    fn test_drop_releases_session_locks() {
        let repo = Repository::open_in_memory().unwrap();
        let file = repo.create_file("/a.txt", ResourceType::Plain, b"a", "admin").unwrap();
        {
            let session = ImportSession::new(&repo, Arc::new(AtomicBool::new(false)));
            LockEntry::new(file.structure_id, session.id(), LockKind::Exclusive)
                .set(repo.conn())
                .unwrap();
        }
        assert!(repo.lock_of(&file.structure_id).unwrap().is_none());
    }

    #[test]
    fn test_refresh_follows_moves() {
        let repo = Repository::open_in_memory().unwrap();
        let file = repo.create_file("/a/x.txt", ResourceType::Plain, b"x", "admin").unwrap();
        let gone = repo.create_file("/a/y.txt", ResourceType::Plain, b"y", "admin").unwrap();
        let mut session = ImportSession::new(&repo, Arc::new(AtomicBool::new(false)));
        let archive_id = StructureId::new();
        session.record(archive_id, "/x.txt".into(), Vec::new(), file.clone());
        session.record(StructureId::new(), "/y.txt".into(), Vec::new(), gone.clone());

        repo.move_resource(&file.structure_id, "/a/z.txt").unwrap();
        repo.delete_resource(&gone.structure_id, crate::repository::SiblingMode::Preserve)
            .unwrap();
        session.refresh().unwrap();

        assert_eq!(session.materialized().len(), 1);
        assert_eq!(session.by_archive_id()[&archive_id].root_path, "/a/z.txt");
        assert_eq!(session.by_archive_path()["/x.txt"].root_path, "/a/z.txt");
        assert!(!session.by_archive_path().contains_key("/y.txt"));
    }

    #[test]
    fn test_cancel_flag() {
        let repo = Repository::open_in_memory().unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let session = ImportSession::new(&repo, cancel.clone());
        assert!(!session.is_cancelled());
        cancel.store(true, Ordering::Relaxed);
        assert!(session.is_cancelled());
    }
}
