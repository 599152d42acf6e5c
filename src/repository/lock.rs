// src/repository/lock.rs

//! Per-entry exclusive lock held by an import session
//!
//! The guard takes an exclusive lock on a resource right before the session
//! modifies it. On success the lock is converted into a working lock for the
//! caller with [`EntryLock::commit`]; if the guard is dropped without a
//! commit, whatever lock existed before is put back.
//!
//! ```ignore
//! let guard = EntryLock::acquire(&repo, &resource, session_id, "admin")?;
//! // ... modify the resource ...
//! guard.commit(&resource.structure_id, "admin")?;
//! ```

use super::Repository;
use crate::db::models::{LockEntry, LockKind, Resource};
use crate::error::{Error, Result};
use crate::resource::StructureId;
use tracing::{debug, warn};

pub struct EntryLock<'a> {
    repo: &'a Repository,
    structure_id: StructureId,
    path: String,
    previous: Option<LockEntry>,
    finished: bool,
}

impl<'a> EntryLock<'a> {
    /// Lock `resource` exclusively for `session`
    ///
    /// A lock already held by `session` or by `lock_owner` is taken over;
    /// anyone else's lock is a conflict.
    pub fn acquire(
        repo: &'a Repository,
        resource: &Resource,
        session: &str,
        lock_owner: &str,
    ) -> Result<Self> {
        let previous = repo.lock_of(&resource.structure_id)?;
        if let Some(lock) = &previous
            && !lock.is_owned_by(session)
            && !lock.is_owned_by(lock_owner)
        {
            return Err(Error::LockConflict {
                path: resource.root_path.clone(),
                owner: lock.owner.clone(),
            });
        }

        LockEntry::new(resource.structure_id, session, LockKind::Exclusive).set(repo.conn())?;
        debug!("Locked {} for session {}", resource.root_path, session);

        Ok(Self {
            repo,
            structure_id: resource.structure_id,
            path: resource.root_path.clone(),
            previous,
            finished: false,
        })
    }

    pub fn structure_id(&self) -> &StructureId {
        &self.structure_id
    }

    /// Hand the modified resource over to `owner` as a working lock
    ///
    /// `target` differs from the locked id when the locked resource was
    /// replaced by a new one during the entry.
    pub fn commit(mut self, target: &StructureId, owner: &str) -> Result<()> {
        if *target != self.structure_id && self.repo.resource_by_id(&self.structure_id)?.is_some()
        {
            LockEntry::delete(self.repo.conn(), &self.structure_id)?;
        }
        LockEntry::new(*target, owner, LockKind::Working).set(self.repo.conn())?;
        self.finished = true;
        Ok(())
    }

    fn restore(&self) -> Result<()> {
        if self.repo.resource_by_id(&self.structure_id)?.is_none() {
            return Ok(());
        }
        match &self.previous {
            Some(lock) => lock.set(self.repo.conn()),
            None => LockEntry::delete(self.repo.conn(), &self.structure_id),
        }
    }
}

impl Drop for EntryLock<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.restore() {
            warn!("Failed to release lock on {}: {}", self.path, e);
        }
    }
}
