// src/engine/report.rs

//! Import session phases and the reports handed back to callers

use crate::error::Error;
use crate::links::BrokenLink;
use serde::Serialize;
use std::fmt;

/// Where an import session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    #[default]
    Idle,
    ReadingManifest,
    ResolvingIdentity,
    Materializing,
    LinkFixup,
    Done,
    Failed,
}

impl ImportPhase {
    pub fn as_str(&self) -> &str {
        match self {
            ImportPhase::Idle => "idle",
            ImportPhase::ReadingManifest => "reading_manifest",
            ImportPhase::ResolvingIdentity => "resolving_identity",
            ImportPhase::Materializing => "materializing",
            ImportPhase::LinkFixup => "link_fixup",
            ImportPhase::Done => "done",
            ImportPhase::Failed => "failed",
        }
    }

    /// Done and Failed are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportPhase::Done | ImportPhase::Failed)
    }
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry (or account) the session could not import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    /// Archive path of the entry, or `account:<name>`
    pub path: String,
    /// Error category, see [`Error::kind`]
    pub kind: String,
    pub message: String,
}

/// Outcome of one import session
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub phase: ImportPhase,
    pub created: usize,
    pub overwritten: usize,
    /// Missing parent folders created on the way to an entry
    pub folders_created: usize,
    /// Entries left alone because of a conflict or a foreign lock
    pub skipped: usize,
    /// Entries that failed for any other reason
    pub failed: usize,
    pub accounts_created: usize,
    pub accounts_skipped: usize,
    /// Content bodies whose links were rewritten
    pub links_rewritten: usize,
    pub failures: Vec<EntryFailure>,
    pub broken_links: Vec<BrokenLink>,
    pub warnings: Vec<String>,
    /// The session stopped early on request
    pub cancelled: bool,
}

impl ImportReport {
    /// Count an entry-level error as skipped or failed
    pub fn record_failure(&mut self, path: &str, error: &Error) {
        match error {
            Error::EntryConflict { .. } | Error::LockConflict { .. } => self.skipped += 1,
            _ => self.failed += 1,
        }
        self.failures.push(EntryFailure {
            path: path.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Number of entries that ended up in the repository
    pub fn imported(&self) -> usize {
        self.created + self.overwritten
    }

    /// Nothing failed, nothing was skipped and no link is broken
    pub fn is_clean(&self) -> bool {
        self.skipped == 0
            && self.failed == 0
            && self.broken_links.is_empty()
            && !self.cancelled
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} created, {} overwritten, {} skipped, {} failed, {} broken link(s)",
            self.created,
            self.overwritten,
            self.skipped,
            self.failed,
            self.broken_links.len()
        );
        if self.folders_created > 0 {
            line.push_str(&format!(", {} folder(s) created", self.folders_created));
        }
        if self.accounts_created > 0 {
            line.push_str(&format!(", {} account(s) created", self.accounts_created));
        }
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Outcome of one export run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub entries: usize,
    /// Distinct content blobs written
    pub blobs: usize,
    /// Resources left out by the system-folder or unchanged filters
    pub skipped: usize,
    pub accounts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_are_classified() {
        let mut report = ImportReport::default();
        report.record_failure(
            "/a.html",
            &Error::EntryConflict {
                path: "/a.html".into(),
                reason: "folder in the way".into(),
            },
        );
        report.record_failure(
            "/b.html",
            &Error::LockConflict {
                path: "/b.html".into(),
                owner: "editor".into(),
            },
        );
        report.record_failure(
            "/c.html",
            &Error::ValidationError {
                path: "/c.html".into(),
                message: "unclosed element".into(),
            },
        );

        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[1].kind, "lock");
        assert!(!report.is_clean());
    }

    #[test]
    fn test_summary() {
        let report = ImportReport {
            created: 3,
            overwritten: 1,
            cancelled: true,
            ..Default::default()
        };
        assert_eq!(report.imported(), 4);
        assert_eq!(
            report.summary(),
            "3 created, 1 overwritten, 0 skipped, 0 failed, 0 broken link(s) (cancelled)"
        );
        let with_folders = ImportReport {
            created: 1,
            folders_created: 2,
            ..Default::default()
        };
        assert_eq!(
            with_folders.summary(),
            "1 created, 0 overwritten, 0 skipped, 0 failed, 0 broken link(s), 2 folder(s) created"
        );
        assert!(ImportPhase::Failed.is_terminal());
        assert_eq!(ImportPhase::LinkFixup.to_string(), "link_fixup");
    }
}
