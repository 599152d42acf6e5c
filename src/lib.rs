// src/lib.rs

//! vfsport: import and export for hierarchical content repositories
//!
//! Moves subtrees of a virtual file system between repositories as
//! self-describing archives, and reconciles what arrives with what is
//! already there.
//!
//! # Architecture
//!
//! - Repository: resources, shared content, properties, access control,
//!   relations and locks in SQLite
//! - Identity: every resource has a structure id (one path instance) and a
//!   resource id (one content body shared by siblings)
//! - Archive: compressed tar holding a JSON manifest and one blob per
//!   resource id
//! - Engine: export walks a subtree; import resolves identities, materializes
//!   entries parents first, replays relations and fixes links
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use vfsport::engine::{Engine, ImportOptions};
//! use vfsport::progress::SilentProgress;
//! use vfsport::repository::Repository;
//! use vfsport::translator::ResourceTranslator;
//!
//! let repo = Repository::open("vfsport.db")?;
//! let engine = Engine::new(ResourceTranslator::identity());
//! let report = engine.import_data(
//!     &repo,
//!     "/sites/default",
//!     Path::new("export.tar.gz"),
//!     &ImportOptions::default(),
//!     &SilentProgress::new(),
//!     &Arc::new(AtomicBool::new(false)),
//! )?;
//! println!("{}", report.summary());
//! # Ok::<(), vfsport::Error>(())
//! ```

pub mod acl;
pub mod compression;
pub mod config;
pub mod db;
pub mod digest;
pub mod engine;
mod error;
pub mod links;
pub mod manifest;
pub mod path;
pub mod progress;
pub mod relation;
pub mod repository;
pub mod resource;
pub mod translator;

pub use acl::{AccessControlEntry, PermissionSet};
pub use compression::CompressionFormat;
pub use config::EngineConfig;
pub use digest::{DigestConverter, DigestPolicy};
pub use engine::{Engine, ExportOptions, ImportOptions, ImportPhase, ImportReport};
pub use error::{Error, Result};
pub use manifest::{Archive, Manifest, ManifestEntry};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use repository::{Repository, SiblingMode};
pub use resource::{ResourceId, ResourceType, StructureId};
pub use translator::ResourceTranslator;
