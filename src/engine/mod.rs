// src/engine/mod.rs

//! Import and export orchestration
//!
//! [`Engine`] ties the pieces together. Export walks a subtree of the live
//! repository and writes an archive. Import runs a session through its
//! phases:
//!
//! ```text
//! Idle -> ReadingManifest -> ResolvingIdentity -> Materializing -> LinkFixup -> Done
//!                 \__________________\___________________\______________\_____-> Failed
//! ```
//!
//! Entry-level problems (conflicts, locks, invalid content) are collected in
//! the [`ImportReport`] and the session carries on. Archive-level problems
//! abort before anything is written.

mod export;
mod identity;
mod import;
mod relations;
mod report;
mod session;
mod siblings;

pub use identity::{Decision, IdentityResolver};
pub use relations::{RelationReplay, replay as replay_relations};
pub use report::{EntryFailure, ExportSummary, ImportPhase, ImportReport};
pub use session::{ImportSession, Materialized};
pub use siblings::{ContentHandle, ContentSource, SiblingLedger};

use crate::compression::CompressionFormat;
use crate::config::EngineConfig;
use crate::digest::DigestConverter;
use crate::error::Result;
use crate::links::LinkParserRegistry;
use crate::manifest::ExportMode;
use crate::translator::ResourceTranslator;

/// Knobs of one import run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Evict live resources that stand in the way instead of skipping the entry
    pub overwrite_collisions: bool,
    /// Validate structured content before writing it; invalid entries fail
    pub xml_validation: bool,
    /// Validate all structured content up front and abort on the first error
    pub strict_validation: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            overwrite_collisions: false,
            xml_validation: true,
            strict_validation: false,
        }
    }
}

/// Knobs of one export run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub include_system_folders: bool,
    /// Also export files that are unchanged since their last publish
    pub include_unchanged_resources: bool,
    pub mode: ExportMode,
    pub include_accounts: bool,
    pub compression: CompressionFormat,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_system_folders: false,
            include_unchanged_resources: true,
            mode: ExportMode::Default,
            include_accounts: false,
            compression: CompressionFormat::default(),
        }
    }
}

/// The import/export engine
#[derive(Debug, Clone)]
pub struct Engine {
    translator: ResourceTranslator,
    digest: DigestConverter,
    parsers: LinkParserRegistry,
    lock_owner: String,
}

impl Engine {
    /// An engine with default digest policy and link parsers
    pub fn new(translator: ResourceTranslator) -> Self {
        Self {
            translator,
            digest: DigestConverter::default(),
            parsers: LinkParserRegistry::with_defaults(),
            lock_owner: "admin".to_string(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            translator: config.translator()?,
            digest: config.digest_converter(),
            parsers: config.link_parsers()?,
            lock_owner: config.engine.lock_owner.clone(),
        })
    }

    pub fn with_lock_owner(mut self, owner: &str) -> Self {
        self.lock_owner = owner.to_string();
        self
    }

    pub fn with_digest_converter(mut self, digest: DigestConverter) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_link_parsers(mut self, parsers: LinkParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn translator(&self) -> &ResourceTranslator {
        &self.translator
    }

    pub fn digest_converter(&self) -> &DigestConverter {
        &self.digest
    }

    pub fn link_parsers(&self) -> &LinkParserRegistry {
        &self.parsers
    }

    /// Owner of the working locks left on imported resources
    pub fn lock_owner(&self) -> &str {
        &self.lock_owner
    }
}
