// tests/roundtrip.rs

//! Export a site from one repository and import it into another.

mod common;

use common::{
    SITE, content_text, export_archive, identity_engine, import_archive, paths_under,
    plain_options, seed_site, setup_repo,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use vfsport::db::models::LockKind;
use vfsport::manifest::ExportMode;
use vfsport::relation::RelationType;
use vfsport::translator::RuleSpec;
use vfsport::{
    Archive, CompressionFormat, Engine, ExportOptions, ImportOptions, ImportPhase,
    ResourceTranslator, SiblingMode, SilentProgress,
};

const COPY: &str = "/sites/copy";

#[test]
fn test_full_site_round_trip() {
    let (_src_dir, src) = setup_repo();
    let (_dst_dir, dst) = setup_repo();
    seed_site(&src);

    let engine = identity_engine();
    let archive = export_archive(&src, &engine, &["/"], &plain_options());
    assert_eq!(archive.manifest.entries.len(), 8);
    // Two siblings, one blob
    assert_eq!(archive.blob_count(), 3);

    let report = import_archive(&dst, &engine, COPY, &archive, &ImportOptions::default());
    assert_eq!(report.phase, ImportPhase::Done);
    assert_eq!(report.created, 8);
    assert_eq!(report.overwritten, 0);
    assert!(report.is_clean(), "{}", report.summary());

    // The missing /sites parent is created and handed to the lock owner
    assert_eq!(report.folders_created, 1);
    let sites = dst.read_resource("/sites").unwrap();
    assert!(sites.is_folder());
    let lock = dst.lock_of(&sites.structure_id).unwrap().unwrap();
    assert_eq!((lock.kind, lock.owner.as_str()), (LockKind::Working, "admin"));

    assert_eq!(
        paths_under(&dst, COPY),
        vec![
            "/sites/copy",
            "/sites/copy/img",
            "/sites/copy/img/logo.png",
            "/sites/copy/index.xml",
            "/sites/copy/news",
            "/sites/copy/news/a.xml",
            "/sites/copy/shared",
            "/sites/copy/shared/logo.png",
        ]
    );

    // Identities survive the move
    for relative in ["/index.xml", "/news/a.xml", "/img/logo.png"] {
        let before = src.read_resource(&format!("{SITE}{relative}")).unwrap();
        let after = dst.read_resource(&format!("{COPY}{relative}")).unwrap();
        assert_eq!(before.structure_id, after.structure_id);
        assert_eq!(before.resource_id, after.resource_id);
        assert_eq!(before.resource_type, after.resource_type);
    }

    let index = dst.read_resource("/sites/copy/index.xml").unwrap();
    assert_eq!(dst.properties(&index.structure_id).unwrap()["Title"], "Home");
    assert_eq!(dst.acl(&index.structure_id).unwrap().len(), 2);
    let lock = dst.lock_of(&index.structure_id).unwrap().unwrap();
    assert_eq!(lock.kind, LockKind::Working);
    assert_eq!(lock.owner, "admin");

    let text = content_text(&dst, "/sites/copy/index.xml");
    assert!(text.contains("/sites/copy/news/a.xml#top"));
    assert!(text.contains("/sites/copy/img/logo.png"));
    assert!(text.contains("https://example.org/"));
    assert!(!text.contains(SITE));
    assert!(text.contains("<title>Home</title>"));

    let news = dst.read_resource("/sites/copy/news/a.xml").unwrap();
    let links = dst.links(&index.structure_id).unwrap();
    assert_eq!(links.len(), 3);
    let to_news = links.iter().find(|l| l.element == "link0").unwrap();
    assert_eq!(to_news.raw_target, "/sites/copy/news/a.xml#top");
    assert_eq!(to_news.target_id, Some(news.structure_id));
    let external = links.iter().find(|l| l.element == "link2").unwrap();
    assert!(external.target_id.is_none());

    let category: Vec<_> = dst
        .relations(&news.structure_id)
        .unwrap()
        .into_iter()
        .filter(|r| r.relation_type == RelationType::Category)
        .collect();
    assert_eq!(category.len(), 1);
    assert_eq!(category[0].target_id, Some(index.structure_id));
    assert_eq!(category[0].target_path, "/sites/copy/index.xml");
}

#[test]
fn test_second_import_is_idempotent() {
    let (_src_dir, src) = setup_repo();
    let (_dst_dir, dst) = setup_repo();
    seed_site(&src);

    let engine = identity_engine();
    let archive = export_archive(&src, &engine, &["/"], &plain_options());
    import_archive(&dst, &engine, COPY, &archive, &ImportOptions::default());
    let paths = paths_under(&dst, COPY);
    let text = content_text(&dst, "/sites/copy/index.xml");
    let index = dst.read_resource("/sites/copy/index.xml").unwrap();
    let links = dst.links(&index.structure_id).unwrap();

    let report = import_archive(&dst, &engine, COPY, &archive, &ImportOptions::default());
    assert_eq!(report.phase, ImportPhase::Done);
    assert_eq!(report.created, 0);
    assert_eq!(report.overwritten, 8);
    assert!(report.is_clean(), "{}", report.summary());

    assert_eq!(paths_under(&dst, COPY), paths);
    assert_eq!(content_text(&dst, "/sites/copy/index.xml"), text);
    assert_eq!(dst.links(&index.structure_id).unwrap(), links);
    let logo = dst.read_resource("/sites/copy/img/logo.png").unwrap();
    assert_eq!(dst.siblings(&logo.resource_id).unwrap().len(), 2);
}

#[test]
fn test_deleted_cross_links_are_restored() {
    let (_dir, repo) = setup_repo();
    seed_site(&repo);
    let engine = identity_engine();
    let archive = export_archive(&repo, &engine, &["/"], &plain_options());

    let index = repo.read_resource(&format!("{SITE}/index.xml")).unwrap();
    let news = repo.read_resource(&format!("{SITE}/news/a.xml")).unwrap();
    let index_text = content_text(&repo, &index.root_path);
    repo.delete_resource(&index.structure_id, SiblingMode::Preserve).unwrap();
    repo.delete_resource(&news.structure_id, SiblingMode::Preserve).unwrap();

    let report = import_archive(&repo, &engine, SITE, &archive, &ImportOptions::default());
    assert_eq!(report.created, 2);
    assert_eq!(report.overwritten, 6);
    assert!(report.is_clean(), "{}", report.summary());
    assert_eq!(content_text(&repo, &index.root_path), index_text);

    let to_news = repo.links(&index.structure_id).unwrap();
    let to_news = to_news.iter().find(|l| l.element == "link0").unwrap();
    assert_eq!(to_news.raw_target, format!("{SITE}/news/a.xml#top"));
    assert_eq!(to_news.target_id, Some(news.structure_id));

    let back = repo.links(&news.structure_id).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].raw_target, format!("{SITE}/index.xml"));
    assert_eq!(back[0].target_id, Some(index.structure_id));
}

#[test]
fn test_reimport_moves_resource_back() {
    let (_dir, repo) = setup_repo();
    seed_site(&repo);
    let engine = identity_engine();
    let archive = export_archive(&repo, &engine, &["/"], &plain_options());

    let index = repo.read_resource(&format!("{SITE}/index.xml")).unwrap();
    repo.move_resource(&index.structure_id, &format!("{SITE}/news/home.xml"))
        .unwrap();

    let report = import_archive(&repo, &engine, SITE, &archive, &ImportOptions::default());
    assert_eq!(report.created, 0);
    assert_eq!(report.overwritten, 8);
    assert!(report.is_clean(), "{}", report.summary());

    let healed = repo.read_resource(&format!("{SITE}/index.xml")).unwrap();
    assert_eq!(healed.structure_id, index.structure_id);
    assert_eq!(healed.resource_id, index.resource_id);
    assert!(repo.resource_by_path(&format!("{SITE}/news/home.xml")).unwrap().is_none());
}

#[test]
fn test_translation_moves_entries_and_their_links() {
    let (_src_dir, src) = setup_repo();
    let (_dst_dir, dst) = setup_repo();
    seed_site(&src);

    let archive = export_archive(&src, &identity_engine(), &["/"], &plain_options());
    // The first matching rule wins
    let translator = ResourceTranslator::new(&[
        RuleSpec::new("^/img/(.*)", "/images/$1"),
        RuleSpec::new("^/img/logo.png", "/never.png"),
    ])
    .unwrap();
    let engine = Engine::new(translator);

    let report = import_archive(&dst, &engine, COPY, &archive, &ImportOptions::default());
    assert!(report.is_clean(), "{}", report.summary());
    assert!(dst.resource_by_path("/sites/copy/images/logo.png").unwrap().is_some());
    assert!(dst.resource_by_path("/sites/copy/img/logo.png").unwrap().is_none());
    assert!(dst.resource_by_path("/sites/copy/never.png").unwrap().is_none());

    let text = content_text(&dst, "/sites/copy/index.xml");
    assert!(text.contains("/sites/copy/images/logo.png"));
}

#[test]
fn test_reduced_export_stamps_importer() {
    let (_src_dir, src) = setup_repo();
    let (_dst_dir, dst) = setup_repo();
    seed_site(&src);

    let options = ExportOptions {
        mode: ExportMode::Reduced,
        ..plain_options()
    };
    let archive = export_archive(&src, &identity_engine(), &["/news"], &options);
    assert!(archive.manifest.entries.iter().all(|e| e.metadata.is_none()));

    let engine = identity_engine().with_lock_owner("importer");
    let report = import_archive(&dst, &engine, COPY, &archive, &ImportOptions::default());
    assert_eq!(report.created, 2);

    let news = dst.read_resource("/sites/copy/news/a.xml").unwrap();
    assert_eq!(news.metadata.user_created, "importer");
    assert_eq!(dst.lock_of(&news.structure_id).unwrap().unwrap().owner, "importer");
    // The link back to index.xml points at nothing this repository knows
    assert_eq!(report.broken_links.len(), 1);
    assert_eq!(report.broken_links[0].source, "/sites/copy/news/a.xml");
}

#[test]
fn test_compressed_archives_on_disk() {
    let (_src_dir, src) = setup_repo();
    seed_site(&src);
    let engine = identity_engine();
    let out_dir = tempfile::tempdir().unwrap();

    for (name, format) in [
        ("site.tar", CompressionFormat::None),
        ("site.tar.gz", CompressionFormat::Gzip),
        ("site.tar.xz", CompressionFormat::Xz),
        ("site.tar.zst", CompressionFormat::Zstd),
    ] {
        let file = out_dir.path().join(name);
        let options = ExportOptions {
            compression: format,
            ..Default::default()
        };
        let summary = engine
            .export_data(&src, SITE, &["/".to_string()], &file, &options, &SilentProgress::new())
            .unwrap();
        assert_eq!(summary.entries, 8);
        assert_eq!(summary.blobs, 3);

        let bytes = std::fs::read(&file).unwrap();
        assert_eq!(CompressionFormat::from_magic_bytes(&bytes), format, "{name}");
        assert_eq!(Archive::read(&file).unwrap().manifest.entries.len(), 8);

        let (_dst_dir, dst) = setup_repo();
        let report = engine
            .import_data(
                &dst,
                COPY,
                &file,
                &ImportOptions::default(),
                &SilentProgress::new(),
                &Arc::new(AtomicBool::new(false)),
            )
            .unwrap();
        assert_eq!(report.created, 8, "{name}");
        let logo = dst.read_resource("/sites/copy/shared/logo.png").unwrap();
        let content = dst.content(&logo.resource_id).unwrap().unwrap();
        assert_eq!(content.data, b"\x89PNG\r\n\x1a\nlogo");
    }
}
