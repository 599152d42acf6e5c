// src/manifest/archive.rs

//! Archive container
//!
//! An archive is a (usually compressed) tar stream:
//!
//! ```text
//! content/<resource-id>    one blob per resource id
//! manifest.json            written last
//! ```
//!
//! Compression is detected from magic bytes when reading, so gzip, zstd, xz
//! and plain tar archives all open the same way.

use super::{CONTENT_DIR, ContentRef, MANIFEST_FILE, Manifest};
use crate::compression::{self, CompressionFormat, Encoder};
use crate::db::models::sha256_hex;
use crate::error::{Error, Result};
use crate::resource::ResourceId;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use tar::{Archive as TarArchive, Builder, EntryType, Header};
use tracing::{debug, info};

/// A fully read and validated archive
#[derive(Debug, Clone)]
pub struct Archive {
    pub manifest: Manifest,
    blobs: HashMap<ResourceId, Vec<u8>>,
}

impl Archive {
    /// Read and validate an archive file
    pub fn read(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| {
            Error::ArchiveError(format!("cannot read archive {}: {e}", path.display()))
        })?;
        let archive = Self::from_bytes(&data)?;
        info!(
            "Read archive {} ({} entries, {} blobs)",
            path.display(),
            archive.manifest.entries.len(),
            archive.blobs.len()
        );
        Ok(archive)
    }

    /// Read and validate an archive held in memory
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let format = CompressionFormat::from_magic_bytes(data);
        debug!("Archive compression: {}", format);
        let decoder = compression::create_decoder(data, format)?;
        let mut tar = TarArchive::new(decoder);

        let mut manifest = None;
        let mut blobs = HashMap::new();
        let entries = tar.entries().map_err(corrupt)?;
        for entry in entries {
            let mut entry = entry.map_err(corrupt)?;
            if entry.header().entry_type() != EntryType::Regular {
                continue;
            }
            let entry_path = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();
            let entry_path = entry_path.strip_prefix("./").unwrap_or(&entry_path).to_string();

            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(corrupt)?;

            if entry_path == MANIFEST_FILE {
                manifest = Some(Manifest::from_json(&content)?);
            } else if let Some(token) = entry_path
                .strip_prefix(CONTENT_DIR)
                .and_then(|rest| rest.strip_prefix('/'))
            {
                let id: ResourceId = token
                    .parse()
                    .map_err(|e| Error::ArchiveError(format!("bad blob name {entry_path}: {e}")))?;
                blobs.insert(id, content);
            } else {
                debug!("Ignoring unexpected archive member {}", entry_path);
            }
        }

        let manifest = manifest
            .ok_or_else(|| Error::ArchiveError(format!("archive has no {MANIFEST_FILE}")))?;
        manifest.validate(&blobs)?;

        Ok(Self { manifest, blobs })
    }

    pub fn blob(&self, id: &ResourceId) -> Option<&[u8]> {
        self.blobs.get(id).map(Vec::as_slice)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

fn corrupt(e: std::io::Error) -> Error {
    Error::ArchiveError(format!("corrupt archive: {e}"))
}

/// Streams blobs and finally the manifest into a tar archive
pub struct ArchiveWriter<W: Write> {
    builder: Builder<Encoder<W>>,
    written: HashMap<ResourceId, ContentRef>,
    mtime: u64,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create an archive file, creating its parent folder if needed
    pub fn create(path: &Path, format: CompressionFormat) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), format)
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(writer: W, format: CompressionFormat) -> Result<Self> {
        let encoder = Encoder::new(writer, format)?;
        Ok(Self {
            builder: Builder::new(encoder),
            written: HashMap::new(),
            mtime: chrono::Utc::now().timestamp().max(0) as u64,
        })
    }

    /// Store the content of a resource id once
    ///
    /// Writing the same id again returns the existing reference.
    pub fn add_blob(&mut self, id: &ResourceId, data: &[u8]) -> Result<ContentRef> {
        if let Some(existing) = self.written.get(id) {
            return Ok(existing.clone());
        }
        self.append(&format!("{CONTENT_DIR}/{id}"), data)?;
        let content = ContentRef {
            token: *id,
            sha256: sha256_hex(data),
            size: data.len() as u64,
        };
        self.written.insert(*id, content.clone());
        Ok(content)
    }

    pub fn has_blob(&self, id: &ResourceId) -> bool {
        self.written.contains_key(id)
    }

    /// Write the manifest and close the archive
    pub fn finish(mut self, manifest: &Manifest) -> Result<W> {
        let json = manifest.to_json()?;
        self.append(MANIFEST_FILE, &json)?;
        let encoder = self.builder.into_inner()?;
        let mut writer = encoder.finish()?;
        writer.flush()?;
        Ok(writer)
    }

    fn append(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(data.len() as u64);
        header.set_mtime(self.mtime);
        header.set_cksum();
        self.builder.append_data(&mut header, name, data)?;
        Ok(())
    }
}
