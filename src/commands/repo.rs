// src/commands/repo.rs

//! Repository commands: init, add, sibling, ls, publish

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use vfsport::{Repository, ResourceType};

pub fn cmd_init(db_path: &str) -> Result<()> {
    if Path::new(db_path).exists() {
        println!("Repository already exists at {}", db_path);
        return Ok(());
    }
    Repository::init(db_path)?;
    println!("Repository initialized at {}", db_path);
    Ok(())
}

/// Guess a resource type from a file name
fn guess_type(path: &str) -> ResourceType {
    let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("xml") => ResourceType::XmlContent,
        Some("png" | "jpg" | "jpeg" | "gif" | "svg" | "webp") => ResourceType::Image,
        Some("pdf" | "zip" | "doc" | "docx" | "xls" | "xlsx") => ResourceType::Binary,
        _ => ResourceType::Plain,
    }
}

pub fn cmd_add(
    db_path: &str,
    file: &Path,
    path: &str,
    resource_type: Option<&str>,
    user: &str,
) -> Result<()> {
    let repo = Repository::open(db_path)?;
    let data = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let resource_type = match resource_type {
        Some(name) => name.parse::<ResourceType>().map_err(|e| anyhow::anyhow!(e))?,
        None => guess_type(path),
    };

    let resource = repo.create_file(path, resource_type, &data, user)?;
    info!("Added {} ({} bytes)", resource.root_path, data.len());
    println!(
        "Added {} as {} ({})",
        resource.root_path, resource.resource_type, resource.structure_id
    );
    Ok(())
}

pub fn cmd_sibling(db_path: &str, source: &str, path: &str, user: &str) -> Result<()> {
    let repo = Repository::open(db_path)?;
    let sibling = repo.create_sibling(source, path, user)?;
    println!(
        "Created {} sharing content {} with {}",
        sibling.root_path, sibling.resource_id, source
    );
    Ok(())
}

pub fn cmd_ls(db_path: &str, path: &str, long: bool) -> Result<()> {
    let repo = Repository::open(db_path)?;
    let resources = repo.list(path)?;
    if resources.is_empty() {
        println!("Nothing under {}", path);
        return Ok(());
    }

    for resource in &resources {
        if long {
            let lock = match repo.lock_of(&resource.structure_id)? {
                Some(lock) => format!("{}:{}", lock.kind, lock.owner),
                None => "-".to_string(),
            };
            let siblings = if resource.is_folder() {
                0
            } else {
                repo.siblings(&resource.resource_id)?.len()
            };
            println!(
                "{:10} {:9} {:>2} {:20} {}  {}",
                resource.resource_type,
                resource.state.as_str(),
                siblings,
                lock,
                resource.structure_id,
                resource.root_path
            );
        } else if resource.is_folder() {
            println!("{}/", resource.root_path);
        } else {
            println!("{}", resource.root_path);
        }
    }
    Ok(())
}

pub fn cmd_publish(db_path: &str, path: &str) -> Result<()> {
    let repo = Repository::open(db_path)?;
    let published = repo.publish(path)?;
    println!("Published {} resource(s) under {}", published, path);
    Ok(())
}
