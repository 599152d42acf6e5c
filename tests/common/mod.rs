// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;
use vfsport::db;
use vfsport::db::models::{Principal, PrincipalKind, Resource};
use vfsport::manifest::{AccountEntry, ArchiveWriter, ExportInfo};
use vfsport::relation::RelationType;
use vfsport::{
    AccessControlEntry, Archive, CompressionFormat, Engine, ExportOptions, ImportOptions,
    ImportReport, Manifest, ManifestEntry, Repository, ResourceId, ResourceTranslator,
    ResourceType, SilentProgress, StructureId,
};

/// Site root the fixture site lives under
pub const SITE: &str = "/sites/default";

/// Create an empty repository in a temp directory.
///
/// Returns (TempDir, Repository) - keep the TempDir alive to prevent cleanup.
pub fn setup_repo() -> (TempDir, Repository) {
    let (temp_dir, db_path) = setup_repo_path();
    let repo = Repository::init(&db_path).unwrap();
    (temp_dir, repo)
}

/// Create a temp directory and return the database path inside it
pub fn setup_repo_path() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("repo.db")
        .to_str()
        .unwrap()
        .to_string();
    (temp_dir, db_path)
}

/// XML page holding one `<link>` element per target
pub fn xml_page(title: &str, links: &[(&str, &str)]) -> Vec<u8> {
    let mut body = String::new();
    for (index, (link_type, target)) in links.iter().enumerate() {
        body.push_str(&format!(
            "    <link name=\"link{index}\" type=\"{link_type}\"><target><![CDATA[{target}]]></target></link>\n"
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<page>\n  <title>{title}</title>\n  <body>\n{body}  </body>\n</page>\n"
    )
    .into_bytes()
}

/// Populate `repo` with a small site below [`SITE`]:
///
/// ```text
/// /sites/default/
///   index.xml          links to news/a.xml, img/logo.png and example.org
///   news/a.xml         links back to index.xml, category of index.xml
///   img/logo.png
///   shared/logo.png    sibling of img/logo.png
/// ```
pub fn seed_site(repo: &Repository) {
    let news_link = format!("{SITE}/news/a.xml#top");
    let logo_link = format!("{SITE}/img/logo.png");
    let home_link = format!("{SITE}/index.xml");

    let index = repo
        .create_file(
            &home_link,
            ResourceType::XmlContent,
            &xml_page(
                "Home",
                &[
                    ("A", news_link.as_str()),
                    ("IMG", logo_link.as_str()),
                    ("A", "https://example.org/"),
                ],
            ),
            "editor",
        )
        .unwrap();
    let news = repo
        .create_file(
            &format!("{SITE}/news/a.xml"),
            ResourceType::XmlContent,
            &xml_page("News", &[("A", home_link.as_str())]),
            "editor",
        )
        .unwrap();
    repo.create_file(
        &format!("{SITE}/img/logo.png"),
        ResourceType::Image,
        b"\x89PNG\r\n\x1a\nlogo",
        "editor",
    )
    .unwrap();
    repo.create_sibling(
        &format!("{SITE}/img/logo.png"),
        &format!("{SITE}/shared/logo.png"),
        "editor",
    )
    .unwrap();

    let mut props = std::collections::BTreeMap::new();
    props.insert("Title".to_string(), "Home".to_string());
    repo.set_properties(&index.structure_id, &props).unwrap();
    repo.set_acl(
        &index.structure_id,
        &[
            AccessControlEntry::parse("GROUP:Users", "+r+v").unwrap(),
            AccessControlEntry::parse("USER:editor", "+r+w+v").unwrap(),
        ],
    )
    .unwrap();
    repo.add_relation(&news.structure_id, &index, RelationType::Category)
        .unwrap();
}

/// Seed accounts through a plain transaction on a second connection
pub fn seed_accounts(db_path: &str, accounts: &[(&str, PrincipalKind, Option<&str>)]) {
    let mut conn = db::open(db_path).unwrap();
    db::transaction(&mut conn, |tx| {
        for (name, kind, digest) in accounts {
            let mut principal = Principal::new(name.to_string(), *kind);
            principal.password_digest = digest.map(str::to_string);
            principal.insert(tx)?;
        }
        Ok(())
    })
    .unwrap();
}

pub fn plain_options() -> ExportOptions {
    ExportOptions {
        compression: CompressionFormat::None,
        ..Default::default()
    }
}

/// Export site-relative `paths` of [`SITE`] into an in-memory archive
pub fn export_archive(repo: &Repository, engine: &Engine, paths: &[&str], options: &ExportOptions) -> Archive {
    let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    let (bytes, _) = engine
        .export_to_writer(repo, SITE, &paths, Vec::new(), options, &SilentProgress::new())
        .unwrap();
    Archive::from_bytes(&bytes).unwrap()
}

pub fn import_archive(
    repo: &Repository,
    engine: &Engine,
    target_root: &str,
    archive: &Archive,
    options: &ImportOptions,
) -> ImportReport {
    engine
        .import_archive(
            repo,
            target_root,
            archive,
            options,
            &SilentProgress::new(),
            &Arc::new(AtomicBool::new(false)),
        )
        .unwrap()
}

pub fn identity_engine() -> Engine {
    Engine::new(ResourceTranslator::identity())
}

/// Root paths of everything below `root`, in path order
pub fn paths_under(repo: &Repository, root: &str) -> Vec<String> {
    repo.list(root)
        .unwrap()
        .into_iter()
        .map(|r: Resource| r.root_path)
        .collect()
}

pub fn content_text(repo: &Repository, root_path: &str) -> String {
    let resource = repo.read_resource(root_path).unwrap();
    let content = repo.content(&resource.resource_id).unwrap().unwrap();
    String::from_utf8(content.data).unwrap()
}

/// A manifest entry with fresh ids and nothing attached
pub fn entry(path: &str, resource_type: ResourceType) -> ManifestEntry {
    ManifestEntry {
        path: path.to_string(),
        structure_id: StructureId::new(),
        resource_id: ResourceId::new(),
        resource_type: resource_type.as_str().to_string(),
        properties: Default::default(),
        acl: Vec::new(),
        relations: Vec::new(),
        metadata: None,
        content: None,
    }
}

/// Write entries (and their blobs) into an archive exported from [`SITE`]
pub fn build_archive(
    entries: Vec<(ManifestEntry, Option<&[u8]>)>,
    accounts: Vec<AccountEntry>,
    format_version: u32,
) -> Archive {
    let mut writer = ArchiveWriter::new(Vec::new(), CompressionFormat::Gzip).unwrap();
    let mut manifest = Manifest::new(ExportInfo::new(SITE, vec!["/".to_string()], "admin"));
    manifest.info.format_version = format_version;
    for (mut e, data) in entries {
        if let Some(data) = data {
            e.content = Some(writer.add_blob(&e.resource_id, data).unwrap());
        }
        manifest.entries.push(e);
    }
    manifest.accounts = accounts;
    Archive::from_bytes(&writer.finish(&manifest).unwrap()).unwrap()
}
