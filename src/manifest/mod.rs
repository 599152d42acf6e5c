// src/manifest/mod.rs

//! Export manifest
//!
//! The manifest describes every exported resource: its site-relative path,
//! both identity keys, type, properties, access control, recorded relations,
//! metadata and a reference to its content blob. Blobs are stored once per
//! resource id, so siblings point at the same token.
//!
//! Manifests are JSON. Unknown resource type names are kept as strings and
//! degrade to `plain` when the importer reads them.

mod archive;

pub use archive::{Archive, ArchiveWriter};

use crate::acl::AccessControlEntry;
use crate::db::models::PrincipalKind;
use crate::error::{Error, Result};
use crate::path;
use crate::relation::RelationEntry;
use crate::resource::{ResourceId, ResourceMetadata, ResourceType, StructureId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Current manifest format version
///
/// Version 1 archives carry hex password digests; version 2 switched to
/// Base64; version 3 added content hashes.
pub const MANIFEST_VERSION: u32 = 3;

/// Name of the manifest inside the archive
pub const MANIFEST_FILE: &str = "manifest.json";

/// Folder holding content blobs inside the archive
pub const CONTENT_DIR: &str = "content";

/// How much metadata an export carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Everything, including user and date metadata
    #[default]
    Default,
    /// No user or date metadata; the importer stamps its own
    Reduced,
}

impl ExportMode {
    pub fn as_str(&self) -> &str {
        match self {
            ExportMode::Default => "default",
            ExportMode::Reduced => "reduced",
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "default" => Ok(ExportMode::Default),
            "reduced" => Ok(ExportMode::Reduced),
            _ => Err(format!("Invalid export mode: {s}")),
        }
    }
}

/// Manifest header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    pub format_version: u32,
    /// Site root the entry paths are relative to
    pub site_root: String,
    /// Site-relative paths the export was asked for
    pub exported_paths: Vec<String>,
    pub exported_at: DateTime<Utc>,
    pub exported_by: String,
    #[serde(default)]
    pub mode: ExportMode,
    /// Tool that wrote the archive
    #[serde(default)]
    pub creator: String,
}

impl ExportInfo {
    pub fn new(site_root: &str, exported_paths: Vec<String>, exported_by: &str) -> Self {
        Self {
            format_version: MANIFEST_VERSION,
            site_root: site_root.to_string(),
            exported_paths,
            exported_at: Utc::now(),
            exported_by: exported_by.to_string(),
            mode: ExportMode::Default,
            creator: format!("vfsport {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A user or group carried by the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub name: String,
    pub kind: PrincipalKind,
    /// Hex MD5 in version 1 archives, Base64 afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Groups a user belongs to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// Reference from an entry to its content blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    /// Blob token; always the resource id
    pub token: ResourceId,
    pub sha256: String,
    pub size: u64,
}

/// One exported resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the export's site root
    pub path: String,
    pub structure_id: StructureId,
    pub resource_id: ResourceId,
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acl: Vec<AccessControlEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<RelationEntry>,
    /// Absent in reduced exports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
    /// Absent for folders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentRef>,
}

impl ManifestEntry {
    /// The entry's type, falling back to `plain` for unknown names
    pub fn resource_type(&self) -> ResourceType {
        ResourceType::from_name_lossy(&self.resource_type).0
    }

    pub fn has_known_type(&self) -> bool {
        ResourceType::from_name_lossy(&self.resource_type).1
    }

    /// Number of `/`-separated components, used to order parents first
    pub fn depth(&self) -> usize {
        self.path.split('/').filter(|c| !c.is_empty()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub info: ExportInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<AccountEntry>,
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(info: ExportInfo) -> Self {
        Self {
            info,
            accounts: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| Error::ArchiveError(format!("invalid {MANIFEST_FILE}: {e}")))
    }

    /// Check the manifest against the blobs that came with it
    ///
    /// Any problem here makes the whole archive unusable, so all errors are
    /// `ArchiveError`.
    pub fn validate(&self, blobs: &HashMap<ResourceId, Vec<u8>>) -> Result<()> {
        let version = self.info.format_version;
        if version == 0 || version > MANIFEST_VERSION {
            return Err(Error::ArchiveError(format!(
                "unsupported manifest version {version} (this build reads 1..={MANIFEST_VERSION})"
            )));
        }

        let mut structure_ids = HashSet::new();
        let mut paths = HashSet::new();
        let mut types: HashMap<ResourceId, &str> = HashMap::new();

        for entry in &self.entries {
            let clean = path::sanitize(&entry.path)
                .map_err(|e| Error::ArchiveError(format!("entry {}: {e}", entry.path)))?;
            if !structure_ids.insert(entry.structure_id) {
                return Err(Error::ArchiveError(format!(
                    "duplicate structure id {} at {}",
                    entry.structure_id, entry.path
                )));
            }
            if !paths.insert(clean) {
                return Err(Error::ArchiveError(format!("duplicate path {}", entry.path)));
            }

            if let Some(previous) = types.insert(entry.resource_id, &entry.resource_type)
                && previous != entry.resource_type
            {
                return Err(Error::ArchiveError(format!(
                    "siblings of {} disagree on type ({} vs {})",
                    entry.resource_id, previous, entry.resource_type
                )));
            }

            if let Some(content) = &entry.content {
                if content.token != entry.resource_id {
                    return Err(Error::ArchiveError(format!(
                        "{}: content token {} does not match resource id {}",
                        entry.path, content.token, entry.resource_id
                    )));
                }
                let blob = blobs.get(&content.token).ok_or_else(|| {
                    Error::ArchiveError(format!("{}: missing blob {}", entry.path, content.token))
                })?;
                if blob.len() as u64 != content.size
                    || crate::db::models::sha256_hex(blob) != content.sha256
                {
                    return Err(Error::ArchiveError(format!(
                        "{}: blob {} failed its integrity check",
                        entry.path, content.token
                    )));
                }
            }
        }

        let mut account_names = HashSet::new();
        for account in &self.accounts {
            if !account_names.insert(account.name.as_str()) {
                return Err(Error::ArchiveError(format!(
                    "duplicate account {}",
                    account.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, content: Option<&[u8]>) -> (ManifestEntry, Option<Vec<u8>>) {
        let resource_id = ResourceId::new();
        let content_ref = content.map(|data| ContentRef {
            token: resource_id,
            sha256: crate::db::models::sha256_hex(data),
            size: data.len() as u64,
        });
        (
            ManifestEntry {
                path: path.to_string(),
                structure_id: StructureId::new(),
                resource_id,
                resource_type: "plain".to_string(),
                properties: BTreeMap::new(),
                acl: Vec::new(),
                relations: Vec::new(),
                metadata: None,
                content: content_ref,
            },
            content.map(<[u8]>::to_vec),
        )
    }

    fn manifest_with(entries: Vec<ManifestEntry>) -> Manifest {
        let mut manifest = Manifest::new(ExportInfo::new("/sites/default", vec!["/".into()], "admin"));
        manifest.entries = entries;
        manifest
    }

    #[test]
    fn test_json_roundtrip_keeps_unknown_types() {
        let (mut e, _) = entry("/a.html", None);
        e.resource_type = "jsp".to_string();
        let manifest = manifest_with(vec![e]);

        let parsed = Manifest::from_json(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(parsed, manifest);
        assert_eq!(parsed.entries[0].resource_type(), ResourceType::Plain);
        assert!(!parsed.entries[0].has_known_type());
    }

    #[test]
    fn test_validate_blobs() {
        let (e, data) = entry("/a.txt", Some(b"hello"));
        let mut blobs = HashMap::new();
        let manifest = manifest_with(vec![e.clone()]);
        assert!(matches!(manifest.validate(&blobs), Err(Error::ArchiveError(_))));

        blobs.insert(e.resource_id, b"tampered".to_vec());
        assert!(manifest.validate(&blobs).is_err());

        blobs.insert(e.resource_id, data.unwrap());
        manifest.validate(&blobs).unwrap();
    }

    #[test]
    fn test_validate_duplicates() {
        let (a, _) = entry("/a.txt", None);
        let (mut b, _) = entry("/b.txt", None);
        b.structure_id = a.structure_id;
        assert!(manifest_with(vec![a.clone(), b]).validate(&HashMap::new()).is_err());

        let (c, _) = entry("/a.txt", None);
        assert!(manifest_with(vec![a, c]).validate(&HashMap::new()).is_err());
    }

    #[test]
    fn test_validate_version() {
        let mut manifest = manifest_with(Vec::new());
        manifest.info.format_version = MANIFEST_VERSION + 1;
        assert!(manifest.validate(&HashMap::new()).is_err());
        manifest.info.format_version = 1;
        manifest.validate(&HashMap::new()).unwrap();
    }

    #[test]
    fn test_validate_rejects_traversal() {
        let (e, _) = entry("/../etc/passwd", None);
        assert!(manifest_with(vec![e]).validate(&HashMap::new()).is_err());
    }

    #[test]
    fn test_entry_depth() {
        let (e, _) = entry("/a/b/c.html", None);
        assert_eq!(e.depth(), 3);
    }
}
