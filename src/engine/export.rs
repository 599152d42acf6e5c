// src/engine/export.rs

//! Export: live subtree to archive
//!
//! Every requested site-relative path is expanded to its subtree. Each
//! resource is read as one consistent snapshot and written as a manifest
//! entry whose path is relative to the site root and passed through the
//! translator. Content is stored once per resource id, so siblings inside
//! the export share one blob.

use super::report::ExportSummary;
use super::{Engine, ExportOptions};
use crate::error::{Error, Result};
use crate::manifest::{
    AccountEntry, ArchiveWriter, ExportInfo, ExportMode, Manifest, ManifestEntry,
};
use crate::path;
use crate::progress::ProgressTracker;
use crate::relation::RelationEntry;
use crate::repository::Repository;
use crate::resource::{ResourceState, StructureId};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

impl Engine {
    /// Export `paths` (relative to `site_root`) into an archive file
    pub fn export_data(
        &self,
        repo: &Repository,
        site_root: &str,
        paths: &[String],
        archive: &Path,
        options: &ExportOptions,
        progress: &dyn ProgressTracker,
    ) -> Result<ExportSummary> {
        let writer = ArchiveWriter::create(archive, options.compression)?;
        let (_, summary) = self.export_into(repo, site_root, paths, writer, options, progress)?;
        info!(
            "Exported {} entries ({} blobs) to {}",
            summary.entries,
            summary.blobs,
            archive.display()
        );
        Ok(summary)
    }

    /// Export into any writer, returning it once the archive is complete
    pub fn export_to_writer<W: Write>(
        &self,
        repo: &Repository,
        site_root: &str,
        paths: &[String],
        writer: W,
        options: &ExportOptions,
        progress: &dyn ProgressTracker,
    ) -> Result<(W, ExportSummary)> {
        let writer = ArchiveWriter::new(writer, options.compression)?;
        self.export_into(repo, site_root, paths, writer, options, progress)
    }

    fn export_into<W: Write>(
        &self,
        repo: &Repository,
        site_root: &str,
        paths: &[String],
        mut writer: ArchiveWriter<W>,
        options: &ExportOptions,
        progress: &dyn ProgressTracker,
    ) -> Result<(W, ExportSummary)> {
        let site_root = path::sanitize(site_root)?;
        if paths.is_empty() {
            return Err(Error::NotFoundError("nothing to export".to_string()));
        }

        let mut info = ExportInfo::new(&site_root, paths.to_vec(), &self.lock_owner);
        info.mode = options.mode;
        let mut manifest = Manifest::new(info);
        let mut summary = ExportSummary::default();
        let mut seen: HashSet<StructureId> = HashSet::new();

        let mut selected = Vec::new();
        for requested in paths {
            let root_path = path::join(&site_root, requested)?;
            let subtree = repo.list(&root_path)?;
            if subtree.is_empty() {
                return Err(Error::NotFoundError(format!("resource {root_path}")));
            }
            for resource in subtree {
                if !seen.insert(resource.structure_id) {
                    continue;
                }
                if !options.include_system_folders && path::is_system(&resource.root_path) {
                    summary.skipped += 1;
                    continue;
                }
                if !options.include_unchanged_resources
                    && !resource.is_folder()
                    && resource.state == ResourceState::Unchanged
                {
                    summary.skipped += 1;
                    continue;
                }
                selected.push(resource.structure_id);
            }
        }

        progress.set_length(selected.len() as u64);
        for structure_id in &selected {
            let snapshot = repo.snapshot(structure_id)?;
            let resource = &snapshot.resource;
            progress.set_message(&resource.root_path);

            let relative = path::strip_root(&resource.root_path, &site_root)
                .map(str::to_string)
                .ok_or_else(|| {
                    Error::InvalidPath(format!("{} is outside {}", resource.root_path, site_root))
                })?;
            let entry_path = path::sanitize(&self.translator.translate(&relative))?;

            let content = match &snapshot.content {
                Some(content) if !resource.is_folder() => {
                    Some(writer.add_blob(&resource.resource_id, &content.data)?)
                }
                _ => None,
            };
            if content.is_none() && !resource.is_folder() {
                debug!("{} has no content", resource.root_path);
            }

            manifest.entries.push(ManifestEntry {
                path: entry_path,
                structure_id: resource.structure_id,
                resource_id: resource.resource_id,
                resource_type: resource.resource_type.as_str().to_string(),
                properties: snapshot.properties.clone(),
                acl: snapshot.acl.iter().filter(|ace| !ace.inherited).cloned().collect(),
                relations: snapshot
                    .relations
                    .iter()
                    .map(|r| RelationEntry::new(r.target_id, &r.target_path, r.relation_type))
                    .collect(),
                metadata: match options.mode {
                    ExportMode::Default => Some(resource.metadata.clone()),
                    ExportMode::Reduced => None,
                },
                content,
            });
            progress.increment(1);
        }

        if options.include_accounts {
            for principal in repo.principals()? {
                let groups = repo.groups_of(&principal.name)?;
                manifest.accounts.push(AccountEntry {
                    name: principal.name,
                    kind: principal.kind,
                    password_digest: principal.password_digest,
                    description: principal.description,
                    groups,
                });
            }
        }

        summary.entries = manifest.entries.len();
        summary.accounts = manifest.accounts.len();
        summary.blobs = {
            let mut tokens: HashSet<_> = HashSet::new();
            for entry in &manifest.entries {
                if let Some(content) = &entry.content {
                    tokens.insert(content.token);
                }
            }
            tokens.len()
        };

        let writer = writer.finish(&manifest)?;
        progress.finish_with_message(&format!("Exported {} entries", summary.entries));
        Ok((writer, summary))
    }
}
