// src/commands/transfer.rs

//! Export, import and inspect commands

use super::progress_for;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::info;
use vfsport::config::EngineConfig;
use vfsport::engine::{Engine, ExportOptions, ImportOptions, ImportReport};
use vfsport::manifest::{Archive, ExportMode};
use vfsport::{CompressionFormat, Repository};

/// Options of the export command
pub struct ExportArgs<'a> {
    pub paths: &'a [String],
    pub output: &'a Path,
    pub site_root: Option<&'a str>,
    pub include_system: bool,
    pub changed_only: bool,
    pub reduced: bool,
    pub accounts: bool,
    pub compression: Option<&'a str>,
}

/// Options of the import command
pub struct ImportArgs<'a> {
    pub archive: &'a Path,
    pub target_root: Option<&'a str>,
    pub overwrite: bool,
    pub no_validate: bool,
    pub strict: bool,
}

pub fn cmd_export(db_path: &str, config: &EngineConfig, args: &ExportArgs<'_>) -> Result<()> {
    let repo = Repository::open(db_path)?;
    let engine = Engine::from_config(config)?;
    let site_root = args.site_root.unwrap_or(&config.engine.site_root);

    let compression = match args.compression {
        Some(name) => name
            .parse::<CompressionFormat>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => {
            let output = args.output.to_string_lossy();
            match CompressionFormat::from_extension(&output) {
                CompressionFormat::None if !output.ends_with(".tar") => config.engine.compression,
                detected => detected,
            }
        }
    };
    let options = ExportOptions {
        include_system_folders: args.include_system,
        include_unchanged_resources: !args.changed_only,
        mode: if args.reduced {
            ExportMode::Reduced
        } else {
            ExportMode::Default
        },
        include_accounts: args.accounts,
        compression,
    };

    info!("Exporting {:?} from {} to {}", args.paths, site_root, args.output.display());
    let progress = progress_for("Exporting");
    let summary = engine
        .export_data(&repo, site_root, args.paths, args.output, &options, progress.as_ref())
        .with_context(|| format!("Export to {} failed", args.output.display()))?;

    println!(
        "Exported {} entries ({} content blobs, {} skipped) to {}",
        summary.entries,
        summary.blobs,
        summary.skipped,
        args.output.display()
    );
    if summary.accounts > 0 {
        println!("Included {} account(s)", summary.accounts);
    }
    Ok(())
}

pub fn cmd_import(
    db_path: &str,
    config: &EngineConfig,
    args: &ImportArgs<'_>,
    json: bool,
) -> Result<()> {
    let repo = Repository::open(db_path)?;
    let engine = Engine::from_config(config)?;
    let target_root = args.target_root.unwrap_or(&config.engine.site_root);
    let options = ImportOptions {
        overwrite_collisions: args.overwrite,
        xml_validation: !args.no_validate,
        strict_validation: args.strict,
    };

    let progress = progress_for("Importing");
    let cancel = Arc::new(AtomicBool::new(false));
    let report = engine
        .import_data(&repo, target_root, args.archive, &options, progress.as_ref(), &cancel)
        .with_context(|| format!("Import of {} failed", args.archive.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ImportReport) {
    println!("Import {}: {}", report.phase, report.summary());
    if !report.failures.is_empty() {
        println!("\nProblems:");
        for failure in &report.failures {
            println!("  [{}] {}", failure.kind, failure.message);
        }
    }
    if !report.broken_links.is_empty() {
        println!("\nBroken links:");
        for link in &report.broken_links {
            println!("  {} ({}) -> {}", link.source, link.element, link.target);
        }
    }
    if !report.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &report.warnings {
            println!("  {}", warning);
        }
    }
}

pub fn cmd_inspect(archive_path: &Path, entries: bool, json: bool) -> Result<()> {
    let archive = Archive::read(archive_path)?;
    let manifest = &archive.manifest;

    if json {
        println!("{}", serde_json::to_string_pretty(manifest)?);
        return Ok(());
    }

    let info = &manifest.info;
    println!("Archive:      {}", archive_path.display());
    println!("Format:       version {}", info.format_version);
    println!("Site root:    {}", info.site_root);
    println!("Exported:     {} by {}", info.exported_at, info.exported_by);
    println!("Mode:         {}", info.mode);
    if !info.creator.is_empty() {
        println!("Creator:      {}", info.creator);
    }
    println!("Paths:        {}", info.exported_paths.join(", "));
    println!("Entries:      {}", manifest.entries.len());
    println!("Blobs:        {}", archive.blob_count());
    println!("Accounts:     {}", manifest.accounts.len());

    let mut by_type: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &manifest.entries {
        *by_type.entry(entry.resource_type.as_str()).or_default() += 1;
    }
    for (resource_type, count) in &by_type {
        println!("  {:12} {}", resource_type, count);
    }

    if entries {
        println!();
        for entry in &manifest.entries {
            let size = entry
                .content
                .as_ref()
                .map(|c| c.size.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:12} {:>10}  {}  {}",
                entry.resource_type, size, entry.structure_id, entry.path
            );
        }
    }
    Ok(())
}
