// src/links/rewriter.rs

//! Second-pass link fixup
//!
//! Links are fixed only after every entry of an import has been
//! materialized, because a link may point at a resource that appears later
//! in the archive. Each link target is resolved in this order:
//!
//! 1. the structure id recorded with the link, if this session imported it
//! 2. the link path, taken relative to the exporting site root, translated
//!    and looked up among the paths this session imported
//!
//! Session targets are rewritten to their new location. Anything else,
//! including a resource that already lives in the repository but was not part
//! of the import, is reported as a broken link and left untouched.
//! Recorded relations use [`LinkResolver::resolve_live`], which also accepts
//! live targets.

use super::{LinkParserRegistry, LinkRewrite, LinkTableEntry};
use crate::db::models::{LinkRow, Resource};
use crate::error::Result;
use crate::path;
use crate::repository::Repository;
use crate::resource::{ResourceId, StructureId};
use crate::translator::ResourceTranslator;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Where an import session placed one archive entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub structure_id: StructureId,
    pub root_path: String,
}

/// Outcome of resolving one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Imported by this session
    Session(SessionTarget),
    /// Already present in the live repository (relation replay only)
    Repository(Resource),
    /// Points outside the repository (`http:`, `mailto:` ...)
    External,
    Broken,
}

/// A link whose target could not be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLink {
    /// Root path of the resource holding the link
    pub source: String,
    pub element: String,
    pub target: String,
}

/// Summary of one link fixup pass
#[derive(Debug, Clone, Default)]
pub struct LinkFixup {
    /// Content bodies that were rewritten
    pub rewritten: usize,
    /// Link table rows stored
    pub links: usize,
    pub broken: Vec<BrokenLink>,
    pub warnings: Vec<String>,
}

/// Resolves link targets against an import session and the live repository
pub struct LinkResolver<'a> {
    repo: &'a Repository,
    translator: &'a ResourceTranslator,
    export_root: &'a str,
    by_archive_id: &'a HashMap<StructureId, SessionTarget>,
    by_archive_path: &'a HashMap<String, SessionTarget>,
}

impl<'a> LinkResolver<'a> {
    /// `by_archive_path` is keyed by translated site-relative archive path
    pub fn new(
        repo: &'a Repository,
        translator: &'a ResourceTranslator,
        export_root: &'a str,
        by_archive_id: &'a HashMap<StructureId, SessionTarget>,
        by_archive_path: &'a HashMap<String, SessionTarget>,
    ) -> Self {
        Self {
            repo,
            translator,
            export_root,
            by_archive_id,
            by_archive_path,
        }
    }

    /// Resolve a link against the resources this session imported
    pub fn resolve(&self, link: &LinkTableEntry) -> LinkTarget {
        if link.is_external() {
            return LinkTarget::External;
        }
        let (target_path, _) = link.split_target();

        if let Some(id) = &link.target_id
            && let Some(found) = self.by_archive_id.get(id)
        {
            return LinkTarget::Session(found.clone());
        }

        if let Some(relative) = path::strip_root(target_path, self.export_root)
            && let Ok(relative) = path::sanitize(relative)
            && let Ok(key) = path::sanitize(&self.translator.translate(&relative))
            && let Some(found) = self.by_archive_path.get(&key)
        {
            return LinkTarget::Session(found.clone());
        }

        LinkTarget::Broken
    }

    /// Like [`resolve`](Self::resolve), falling back to the live repository
    /// by structure id and then by path
    pub fn resolve_live(&self, link: &LinkTableEntry) -> Result<LinkTarget> {
        let target = self.resolve(link);
        if target != LinkTarget::Broken {
            return Ok(target);
        }
        let (target_path, _) = link.split_target();

        if let Some(id) = &link.target_id
            && let Some(live) = self.repo.resource_by_id(id)?
        {
            return Ok(LinkTarget::Repository(live));
        }
        if let Some(live) = self.repo.resource_by_path(target_path)? {
            return Ok(LinkTarget::Repository(live));
        }
        Ok(LinkTarget::Broken)
    }

    /// Re-parse every link-parseable source and store its link table
    ///
    /// Content shared by siblings is rewritten once; the link table is stored
    /// for every structure id.
    pub fn fixup(&self, parsers: &LinkParserRegistry, sources: &[Resource]) -> Result<LinkFixup> {
        let mut summary = LinkFixup::default();
        let mut tables: HashMap<ResourceId, Vec<LinkRow>> = HashMap::new();

        for source in sources {
            let Some(parser) = parsers.get(source.resource_type) else {
                continue;
            };

            if !tables.contains_key(&source.resource_id) {
                let Some(content) = self.repo.content(&source.resource_id)? else {
                    summary
                        .warnings
                        .push(format!("{}: no content to scan for links", source.root_path));
                    continue;
                };
                let links = match parser.parse(&content.data) {
                    Ok(links) => links,
                    Err(e) => {
                        warn!("Skipping link fixup for {}: {}", source.root_path, e);
                        summary.warnings.push(format!("{}: {}", source.root_path, e));
                        continue;
                    }
                };

                let mut rows = Vec::with_capacity(links.len());
                let mut rewrites = Vec::new();
                for link in &links {
                    let (_, suffix) = link.split_target();
                    let (new_target, target_id, rewrite) = match self.resolve(link) {
                        LinkTarget::Session(found) => {
                            let new_target = format!("{}{}", found.root_path, suffix);
                            let stale_id = link
                                .target_id
                                .is_some_and(|id| id != found.structure_id);
                            let rewrite = new_target != link.target || stale_id;
                            (new_target, Some(found.structure_id), rewrite)
                        }
                        LinkTarget::External => (link.target.clone(), None, false),
                        LinkTarget::Repository(_) | LinkTarget::Broken => {
                            debug!("Broken link {} -> {}", source.root_path, link.target);
                            summary.broken.push(BrokenLink {
                                source: source.root_path.clone(),
                                element: link.element.clone(),
                                target: link.target.clone(),
                            });
                            (link.target.clone(), None, false)
                        }
                    };

                    if rewrite {
                        rewrites.push(LinkRewrite {
                            element: link.element.clone(),
                            target: new_target.clone(),
                            target_id,
                        });
                    }
                    rows.push(LinkRow {
                        source_id: source.structure_id,
                        element: link.element.clone(),
                        raw_target: new_target,
                        target_id,
                        kind: link.relation_type,
                    });
                }

                if !rewrites.is_empty() {
                    let updated = parser.rewrite(&content.data, &rewrites)?;
                    if updated != content.data {
                        self.repo.write_content(&source.resource_id, &updated)?;
                        summary.rewritten += 1;
                    }
                }
                tables.insert(source.resource_id, rows);
            }

            if let Some(rows) = tables.get(&source.resource_id) {
                self.repo.store_links(&source.structure_id, rows)?;
                summary.links += rows.len();
            }
        }

        Ok(summary)
    }
}
