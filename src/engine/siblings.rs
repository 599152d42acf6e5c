// src/engine/siblings.rs

//! Sibling coordination within one import session
//!
//! Siblings share one content body keyed by resource id. The first entry of
//! a resource id to be materialized writes the archive blob; every later
//! sibling only links its structure row to that content. An entry whose
//! resource id has no blob in the archive links to content already present
//! in the repository, or fails when there is none.
//!
//! Content is recorded in the ledger only after the entry that wrote it has
//! committed, so a rolled-back entry never leaves a sibling pointing at
//! content that was never stored.

use crate::error::{Error, Result};
use crate::manifest::Archive;
use crate::repository::Repository;
use crate::resource::ResourceId;
use std::collections::HashMap;
use tracing::debug;

/// Where the content of a resource id came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    /// Written from the archive blob by this session
    Archive,
    /// Already present in the repository
    Repository,
}

/// Content of one resource id as seen by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHandle {
    pub resource_id: ResourceId,
    pub source: ContentSource,
    /// Whether the call that returned this handle wrote the content
    pub written: bool,
}

#[derive(Debug, Default)]
pub struct SiblingLedger {
    stored: HashMap<ResourceId, ContentSource>,
}

impl SiblingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the content of `resource_id` available, writing it at most once
    ///
    /// `path` only names the entry in errors.
    pub fn ensure_content(
        &self,
        repo: &Repository,
        archive: &Archive,
        resource_id: &ResourceId,
        path: &str,
    ) -> Result<ContentHandle> {
        if let Some(source) = self.stored.get(resource_id) {
            debug!("{} links to content {} already imported", path, resource_id);
            return Ok(ContentHandle {
                resource_id: *resource_id,
                source: *source,
                written: false,
            });
        }

        if let Some(data) = archive.blob(resource_id) {
            repo.write_content(resource_id, data)?;
            return Ok(ContentHandle {
                resource_id: *resource_id,
                source: ContentSource::Archive,
                written: true,
            });
        }

        if repo.has_content(resource_id)? {
            debug!("{} links to live content {}", path, resource_id);
            return Ok(ContentHandle {
                resource_id: *resource_id,
                source: ContentSource::Repository,
                written: false,
            });
        }

        Err(Error::NotFoundError(format!(
            "content {resource_id} for {path} is neither in the archive nor in the repository"
        )))
    }

    /// Remember content once the entry that needed it has committed
    pub fn record(&mut self, handle: &ContentHandle) {
        self.stored.entry(handle.resource_id).or_insert(handle.source);
    }

    pub fn contains(&self, resource_id: &ResourceId) -> bool {
        self.stored.contains_key(resource_id)
    }

    /// Number of distinct content bodies the session has dealt with
    pub fn len(&self) -> usize {
        self.stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }
}
