// src/error.rs

//! Error types shared across the engine
//!
//! Errors fall into two groups. Archive- and configuration-level errors abort
//! an import before anything is written. Entry-level errors (conflicts, locks,
//! validation of a single resource) are caught by the orchestrator and folded
//! into the session report.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad translation rule, bad engine configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Corrupt archive, missing manifest, blob integrity failure
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// Incoming entry collides with an existing resource
    #[error("Conflict at {path}: {reason}")]
    EntryConflict { path: String, reason: String },

    /// Resource is locked by someone other than the current session
    #[error("{path} is locked by {owner}")]
    LockConflict { path: String, owner: String },

    /// Structured content failed validation
    #[error("Validation failed for {path}: {message}")]
    ValidationError { path: String, message: String },

    /// Malformed legacy password digest
    #[error("Invalid digest: {0}")]
    DigestError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error only concerns one entry and the session can go on
    pub fn is_entry_level(&self) -> bool {
        matches!(
            self,
            Self::EntryConflict { .. }
                | Self::LockConflict { .. }
                | Self::ValidationError { .. }
                | Self::DigestError(_)
                | Self::NotFoundError(_)
                | Self::InvalidPath(_)
                | Self::Database(_)
                | Self::Io(_)
                | Self::ParseError(_)
        )
    }

    /// Short machine-readable category, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "configuration",
            Self::ArchiveError(_) => "archive",
            Self::EntryConflict { .. } => "conflict",
            Self::LockConflict { .. } => "lock",
            Self::ValidationError { .. } => "validation",
            Self::DigestError(_) => "digest",
            Self::NotFoundError(_) => "not-found",
            Self::InvalidPath(_) => "path",
            Self::ParseError(_) => "parse",
            Self::Cancelled => "cancelled",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}
