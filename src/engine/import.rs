// src/engine/import.rs

//! Import: archive to live repository
//!
//! An import session runs in phases. Every entry is resolved first, so that
//! conflicts show up in the report before anything is written. Entries are
//! then materialized parents first; each one is re-resolved right before it
//! is written, locked exclusively for the session and written inside one
//! savepoint, so a failing entry leaves nothing behind. Once all entries are
//! in place, recorded relations are replayed and links are fixed.
//!
//! Cancellation is checked between entries. A cancelled session still fixes
//! the links of whatever it already wrote and ends in the Failed phase.

use super::identity::IdentityResolver;
use super::relations;
use super::report::{ImportPhase, ImportReport};
use super::session::ImportSession;
use super::{Engine, ImportOptions};
use crate::acl;
use crate::db::models::{Principal, PrincipalKind, Resource};
use crate::error::{Error, Result};
use crate::links::LinkResolver;
use crate::manifest::{AccountEntry, Archive, Manifest, ManifestEntry};
use crate::path;
use crate::progress::ProgressTracker;
use crate::repository::{EntryLock, Repository, SiblingMode};
use crate::resource::{ResourceMetadata, ResourceState};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{debug, info, warn};

/// An entry that survived identity resolution
struct Planned<'m> {
    entry: &'m ManifestEntry,
    /// Translated site-relative path
    key: String,
    /// Root path in the target repository
    target: String,
}

impl Engine {
    /// Import an archive file below `target_root`
    pub fn import_data(
        &self,
        repo: &Repository,
        target_root: &str,
        archive: &Path,
        options: &ImportOptions,
        progress: &dyn ProgressTracker,
        cancel: &Arc<AtomicBool>,
    ) -> Result<ImportReport> {
        let archive = match Archive::read(archive) {
            Ok(archive) => archive,
            Err(e) => {
                progress.finish_with_error(&e.to_string());
                return Err(e);
            }
        };
        self.import_archive(repo, target_root, &archive, options, progress, cancel)
    }

    /// Import an archive that has already been read and validated
    pub fn import_archive(
        &self,
        repo: &Repository,
        target_root: &str,
        archive: &Archive,
        options: &ImportOptions,
        progress: &dyn ProgressTracker,
        cancel: &Arc<AtomicBool>,
    ) -> Result<ImportReport> {
        let target_root = path::sanitize(target_root)?;
        let mut session = ImportSession::new(repo, Arc::clone(cancel));
        session.enter(ImportPhase::ReadingManifest);

        let manifest = &archive.manifest;
        let export_root = match path::sanitize(&manifest.info.site_root) {
            Ok(root) => root,
            Err(e) => {
                let e = Error::ArchiveError(format!("site root of the archive: {e}"));
                return Err(abort(&mut session, progress, e));
            }
        };
        info!(
            "Importing {} entries exported from {} by {} into {}",
            manifest.entries.len(),
            export_root,
            manifest.info.exported_by,
            target_root
        );

        let mut order: Vec<&ManifestEntry> = manifest.entries.iter().collect();
        order.sort_by_key(|entry| entry.depth());
        for entry in &order {
            if !entry.has_known_type() {
                session.report_mut().warn(format!(
                    "{}: unknown type {} imported as {}",
                    entry.path,
                    entry.resource_type,
                    entry.resource_type()
                ));
            }
        }

        if options.strict_validation
            && let Err(e) = self.validate_all(archive, &order)
        {
            return Err(abort(&mut session, progress, e));
        }
        progress.set_length(order.len() as u64);

        session.enter(ImportPhase::ResolvingIdentity);
        let session_id = session.id().to_string();
        let resolver = IdentityResolver::new(
            repo,
            &session_id,
            &self.lock_owner,
            options.overwrite_collisions,
        );
        let mut plan = Vec::with_capacity(order.len());
        for entry in order {
            if session.is_cancelled() {
                session.report_mut().cancelled = true;
                break;
            }
            let planned = self.target_of(&target_root, entry).and_then(|(key, target)| {
                resolver.resolve(entry, &target)?;
                Ok(Planned { entry, key, target })
            });
            match planned {
                Ok(planned) if planned.target == "/" => {
                    debug!("{} maps onto the repository root; nothing to write", entry.path);
                    progress.increment(1);
                }
                Ok(planned) => plan.push(planned),
                Err(e) if e.is_entry_level() => {
                    warn!("Skipping {}: {}", entry.path, e);
                    session.report_mut().record_failure(&entry.path, &e);
                    progress.increment(1);
                }
                Err(e) => return Err(abort(&mut session, progress, e)),
            }
        }

        session.enter(ImportPhase::Materializing);
        if !session.is_cancelled()
            && let Err(e) = self.import_accounts(repo, manifest, session.report_mut())
        {
            return Err(abort(&mut session, progress, e));
        }
        for planned in &plan {
            if session.is_cancelled() {
                session.report_mut().cancelled = true;
                break;
            }
            progress.set_message(&planned.entry.path);
            match self.materialize(repo, &resolver, &mut session, archive, planned, options) {
                Ok(true) => session.report_mut().created += 1,
                Ok(false) => session.report_mut().overwritten += 1,
                Err(e) if e.is_entry_level() => {
                    warn!("Failed to import {}: {}", planned.entry.path, e);
                    session.report_mut().record_failure(&planned.entry.path, &e);
                }
                Err(e) => return Err(abort(&mut session, progress, e)),
            }
            progress.increment(1);
        }

        session.enter(ImportPhase::LinkFixup);
        if let Err(e) = self.fix_links(repo, &mut session, &export_root) {
            return Err(abort(&mut session, progress, e));
        }

        if session.report().cancelled {
            session.enter(ImportPhase::Failed);
            progress.finish_with_error("Import cancelled");
        } else {
            session.enter(ImportPhase::Done);
            progress.finish_with_message("Import complete");
        }
        let report = session.finish();
        info!("Import finished: {}", report.summary());
        Ok(report)
    }

    /// Translated site-relative path and target root path of an entry
    fn target_of(&self, target_root: &str, entry: &ManifestEntry) -> Result<(String, String)> {
        let relative = path::sanitize(&entry.path)?;
        let key = path::sanitize(&self.translator.translate(&relative))?;
        let target = path::join(target_root, &key)?;
        Ok((key, target))
    }

    /// Validate every link-parseable blob before anything is written
    fn validate_all(&self, archive: &Archive, order: &[&ManifestEntry]) -> Result<()> {
        let mut checked = HashSet::new();
        for entry in order {
            let Some(parser) = self.parsers.get(entry.resource_type()) else {
                continue;
            };
            if !checked.insert(entry.resource_id) {
                continue;
            }
            if let Some(data) = archive.blob(&entry.resource_id) {
                parser.validate(data).map_err(|message| Error::ValidationError {
                    path: entry.path.clone(),
                    message,
                })?;
            }
        }
        debug!("Validated {} structured content bodies", checked.len());
        Ok(())
    }

    /// Write one entry; returns true when a new resource was created
    fn materialize(
        &self,
        repo: &Repository,
        resolver: &IdentityResolver<'_>,
        session: &mut ImportSession<'_>,
        archive: &Archive,
        planned: &Planned<'_>,
        options: &ImportOptions,
    ) -> Result<bool> {
        let entry = planned.entry;
        let target = planned.target.as_str();
        let resource_type = entry.resource_type();

        if options.xml_validation
            && !options.strict_validation
            && !session.ledger.contains(&entry.resource_id)
            && let Some(parser) = self.parsers.get(resource_type)
            && let Some(data) = archive.blob(&entry.resource_id)
        {
            parser.validate(data).map_err(|message| Error::ValidationError {
                path: entry.path.clone(),
                message,
            })?;
        }

        // The repository may have changed since the resolution pass
        let decision = resolver.resolve(entry, target)?;
        let session_id = session.id().to_string();
        let mut guards = Vec::new();
        for resource in decision.touched() {
            guards.push(EntryLock::acquire(repo, resource, &session_id, &self.lock_owner)?);
        }

        let ledger = &session.ledger;
        let (resource, content, folders) = repo.atomically(|| {
            for evicted in decision.evicted() {
                // An evicted folder may already have taken this one with it
                if repo.resource_by_id(&evicted.structure_id)?.is_some() {
                    let removed = repo.delete_resource(&evicted.structure_id, SiblingMode::Preserve)?;
                    debug!("Evicted {} ({} row(s))", evicted.root_path, removed);
                }
            }
            let folders = match path::parent(target) {
                Some(parent) => repo.ensure_folders(parent, &self.lock_owner)?,
                None => Vec::new(),
            };

            let metadata = entry
                .metadata
                .clone()
                .unwrap_or_else(|| ResourceMetadata::now(&self.lock_owner));
            let resource = match decision.kept() {
                Some(kept) => {
                    let mut live = repo.move_resource(&kept.structure_id, target)?;
                    let previous_content = live.resource_id;
                    live.resource_id = entry.resource_id;
                    live.resource_type = resource_type;
                    live.metadata = metadata;
                    if live.state != ResourceState::New {
                        live.state = ResourceState::Changed;
                    }
                    repo.update_resource(&live)?;
                    if previous_content != entry.resource_id
                        && repo.release_content(&previous_content)?
                    {
                        debug!("Dropped content {} no longer used by any sibling", previous_content);
                    }
                    live
                }
                None => {
                    let created = Resource::new(
                        entry.structure_id,
                        entry.resource_id,
                        target.to_string(),
                        resource_type,
                        metadata,
                    );
                    repo.create_resource(&created)?;
                    created
                }
            };

            let content = if resource_type.is_folder() {
                None
            } else {
                Some(ledger.ensure_content(repo, archive, &entry.resource_id, &entry.path)?)
            };

            repo.set_properties(&resource.structure_id, &entry.properties)?;
            let merged = acl::merge(&repo.acl(&resource.structure_id)?, &entry.acl);
            if !merged.removed.is_empty() {
                debug!(
                    "{}: dropped access entries for {}",
                    resource.root_path,
                    merged.removed.join(", ")
                );
            }
            repo.set_acl(&resource.structure_id, &merged.entries)?;

            Ok((resource, content, folders))
        })?;

        // Hand the written resource over to the lock owner; evicted resources
        // are gone, so their guards have nothing to restore
        let (primary, others): (Vec<_>, Vec<_>) = guards
            .into_iter()
            .partition(|guard| *guard.structure_id() == resource.structure_id);
        drop(others);
        match primary.into_iter().next() {
            Some(guard) => guard.commit(&resource.structure_id, &self.lock_owner)?,
            None => repo.lock_resource(&resource.root_path, &self.lock_owner)?,
        }

        for folder in &folders {
            repo.lock_resource(folder, &self.lock_owner)?;
        }
        if !folders.is_empty() {
            debug!("Created parent folder(s) {}", folders.join(", "));
            session.report_mut().folders_created += folders.len();
        }

        if let Some(handle) = &content {
            session.ledger.record(handle);
        }
        if resource.structure_id != entry.structure_id {
            session.report_mut().warn(format!(
                "{}: structure id {} taken over by existing {} at {}",
                entry.path, entry.structure_id, resource.structure_id, resource.root_path
            ));
        }
        debug!(
            "{} {} as {}",
            decision.as_str(),
            entry.path,
            resource.root_path
        );
        session.record(
            entry.structure_id,
            planned.key.clone(),
            entry.relations.clone(),
            resource,
        );
        Ok(!decision.replaces_existing())
    }

    /// Create the accounts the repository does not have yet
    ///
    /// Existing principals are left untouched. A digest that cannot be
    /// converted fails that account only.
    fn import_accounts(
        &self,
        repo: &Repository,
        manifest: &Manifest,
        report: &mut ImportReport,
    ) -> Result<()> {
        let version = manifest.info.format_version;
        let mut accounts: Vec<&AccountEntry> = manifest.accounts.iter().collect();
        // Groups first so memberships can be added right away
        accounts.sort_by_key(|account| account.kind != PrincipalKind::Group);

        let mut created = Vec::new();
        for account in accounts {
            let label = format!("account:{}", account.name);
            if repo.principal(&account.name)?.is_some() {
                debug!("Keeping existing {} {}", account.kind, account.name);
                report.accounts_skipped += 1;
                continue;
            }

            let digest = account
                .password_digest
                .as_deref()
                .map(|digest| self.digest.normalize(version, digest))
                .transpose();
            let digest = match digest {
                Ok(digest) => digest,
                Err(e) => {
                    warn!("Cannot import {}: {}", label, e);
                    report.record_failure(&label, &e);
                    continue;
                }
            };

            let mut principal = Principal::new(account.name.clone(), account.kind);
            principal.password_digest = digest;
            principal.description = account.description.clone();
            repo.create_principal(&mut principal)?;
            report.accounts_created += 1;
            created.push(account);
        }

        for account in created {
            for group in &account.groups {
                match repo.principal(group)? {
                    Some(found) if found.kind == PrincipalKind::Group => {
                        repo.add_group_member(group, &account.name)?;
                    }
                    _ => report.warn(format!(
                        "account:{}: group {} does not exist",
                        account.name, group
                    )),
                }
            }
        }

        if report.accounts_created > 0 {
            info!("Created {} account(s)", report.accounts_created);
        }
        Ok(())
    }

    /// Replay recorded relations and fix links of everything the session wrote
    fn fix_links(
        &self,
        repo: &Repository,
        session: &mut ImportSession<'_>,
        export_root: &str,
    ) -> Result<()> {
        session.refresh()?;
        let sources: Vec<Resource> = session
            .materialized()
            .iter()
            .map(|item| item.resource.clone())
            .collect();

        let (replayed, fixup) = {
            let resolver = LinkResolver::new(
                repo,
                &self.translator,
                export_root,
                session.by_archive_id(),
                session.by_archive_path(),
            );
            let replayed = relations::replay(repo, &resolver, session.materialized())?;
            let fixup = resolver.fixup(&self.parsers, &sources)?;
            (replayed, fixup)
        };

        for broken in &fixup.broken {
            warn!("Broken link in {}: {} -> {}", broken.source, broken.element, broken.target);
        }
        info!(
            "Stored {} relation(s) and {} link(s), rewrote {} content bodies",
            replayed.stored, fixup.links, fixup.rewritten
        );

        let report = session.report_mut();
        report.warnings.extend(replayed.warnings);
        report.warnings.extend(fixup.warnings);
        report.links_rewritten = fixup.rewritten;
        report.broken_links = fixup.broken;
        Ok(())
    }
}

/// Move the session to Failed and pass the error on
fn abort(session: &mut ImportSession<'_>, progress: &dyn ProgressTracker, error: Error) -> Error {
    warn!("Import aborted: {}", error);
    session.enter(ImportPhase::Failed);
    progress.finish_with_error(&error.to_string());
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AccessControlEntry;
    use crate::compression::CompressionFormat;
    use crate::db::models::LockKind;
    use crate::manifest::{ArchiveWriter, ExportInfo};
    use crate::progress::SilentProgress;
    use crate::resource::{ResourceId, ResourceType, StructureId};
    use crate::translator::ResourceTranslator;
    use std::collections::BTreeMap;

    fn entry(path: &str, resource_type: ResourceType) -> ManifestEntry {
        ManifestEntry {
            path: path.to_string(),
            structure_id: StructureId::new(),
            resource_id: ResourceId::new(),
            resource_type: resource_type.as_str().to_string(),
            properties: BTreeMap::new(),
            acl: Vec::new(),
            relations: Vec::new(),
            metadata: None,
            content: None,
        }
    }

    fn build(entries: Vec<(ManifestEntry, Option<&[u8]>)>, accounts: Vec<AccountEntry>) -> Archive {
        let mut writer = ArchiveWriter::new(Vec::new(), CompressionFormat::None).unwrap();
        let mut manifest = Manifest::new(ExportInfo::new("/sites/old", vec!["/".into()], "admin"));
        for (mut e, data) in entries {
            if let Some(data) = data {
                e.content = Some(writer.add_blob(&e.resource_id, data).unwrap());
            }
            manifest.entries.push(e);
        }
        manifest.accounts = accounts;
        Archive::from_bytes(&writer.finish(&manifest).unwrap()).unwrap()
    }

    fn run(repo: &Repository, archive: &Archive, options: &ImportOptions) -> Result<ImportReport> {
        Engine::new(ResourceTranslator::identity()).import_archive(
            repo,
            "/sites/new",
            archive,
            options,
            &SilentProgress::new(),
            &Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn test_import_into_empty_repository() {
        let repo = Repository::open_in_memory().unwrap();
        let mut page = entry("/news/a.html", ResourceType::Plain);
        page.properties.insert("Title".into(), "A".into());
        page.acl.push(AccessControlEntry::parse("GROUP:Users", "+r").unwrap());
        // Children listed before their parent still land parents first
        let archive = build(
            vec![(page.clone(), Some(&b"<p>a</p>"[..])), (entry("/news", ResourceType::Folder), None)],
            Vec::new(),
        );

        let report = run(&repo, &archive, &ImportOptions::default()).unwrap();
        assert_eq!(report.phase, ImportPhase::Done);
        assert_eq!(report.created, 2);
        assert!(report.is_clean());

        let live = repo.read_resource("/sites/new/news/a.html").unwrap();
        assert_eq!(live.structure_id, page.structure_id);
        assert_eq!(live.resource_id, page.resource_id);
        assert_eq!(repo.content(&live.resource_id).unwrap().unwrap().data, b"<p>a</p>");
        assert_eq!(repo.properties(&live.structure_id).unwrap()["Title"], "A");
        assert_eq!(repo.acl(&live.structure_id).unwrap(), page.acl);

        let lock = repo.lock_of(&live.structure_id).unwrap().unwrap();
        assert_eq!(lock.kind, LockKind::Working);
        assert_eq!(lock.owner, "admin");
    }

    #[test]
    fn test_preset_cancel_writes_nothing() {
        let repo = Repository::open_in_memory().unwrap();
        let archive = build(vec![(entry("/a.txt", ResourceType::Plain), Some(&b"a"[..]))], Vec::new());
        let report = Engine::new(ResourceTranslator::identity())
            .import_archive(
                &repo,
                "/sites/new",
                &archive,
                &ImportOptions::default(),
                &SilentProgress::new(),
                &Arc::new(AtomicBool::new(true)),
            )
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.phase, ImportPhase::Failed);
        assert_eq!(report.created, 0);
        assert!(repo.resource_by_path("/sites/new/a.txt").unwrap().is_none());
    }

    #[test]
    fn test_validation_modes() {
        let repo = Repository::open_in_memory().unwrap();
        let archive = build(
            vec![
                (entry("/ok.txt", ResourceType::Plain), Some(&b"fine"[..])),
                (entry("/bad.xml", ResourceType::XmlContent), Some(&b"<a><b></a>"[..])),
            ],
            Vec::new(),
        );

        let strict = ImportOptions {
            strict_validation: true,
            ..Default::default()
        };
        assert!(matches!(
            run(&repo, &archive, &strict),
            Err(Error::ValidationError { .. })
        ));
        assert!(repo.resource_by_path("/sites/new/ok.txt").unwrap().is_none());

        let report = run(&repo, &archive, &ImportOptions::default()).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].kind, "validation");

        let lenient = ImportOptions {
            xml_validation: false,
            ..Default::default()
        };
        let report = run(&repo, &archive, &lenient).unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.overwritten, 1);
    }

    #[test]
    fn test_accounts() {
        let repo = Repository::open_in_memory().unwrap();
        let mut existing = Principal::new("Admin".into(), PrincipalKind::User);
        existing.password_digest = Some("keep".into());
        repo.create_principal(&mut existing).unwrap();

        let account = |name: &str, kind, digest: Option<&str>, groups: &[&str]| AccountEntry {
            name: name.to_string(),
            kind,
            password_digest: digest.map(str::to_string),
            description: None,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        };
        let mut archive = build(
            Vec::new(),
            vec![
                account("editor", PrincipalKind::User, Some("dfcd4cbbda27e5569d03a75e38024f19"), &["Users"]),
                account("Users", PrincipalKind::Group, None, &[]),
                account("Admin", PrincipalKind::User, Some("a1a3afa9fad72527c309ca8eca009f43"), &[]),
                account("broken", PrincipalKind::User, Some("not-hex"), &[]),
            ],
        );
        archive.manifest.info.format_version = 1;

        let report = run(&repo, &archive, &ImportOptions::default()).unwrap();
        assert_eq!(report.accounts_created, 2);
        assert_eq!(report.accounts_skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].path, "account:broken");

        let editor = repo.principal("editor").unwrap().unwrap();
        assert_eq!(editor.password_digest.as_deref(), Some("X03MO1qnZdYdgyfeuILPmQ=="));
        assert_eq!(repo.groups_of("editor").unwrap(), vec!["Users".to_string()]);
        let admin = repo.principal("Admin").unwrap().unwrap();
        assert_eq!(admin.password_digest.as_deref(), Some("keep"));
    }
}
