// src/digest.rs

//! Legacy password digest conversion
//!
//! Early archive versions stored MD5 password digests as 32 hex characters,
//! where every byte had been shifted by +128 before printing. Current
//! repositories store the raw 16 digest bytes Base64-encoded. Conversion is
//! only applied to accounts read from archives older than
//! [`DIGEST_BASE64_VERSION`].

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Length of an MD5 digest written as hex
pub const LEGACY_DIGEST_HEX_LEN: usize = 32;

/// First archive format version whose digests are already Base64
pub const DIGEST_BASE64_VERSION: u32 = 2;

/// Convert a legacy hex digest to the Base64 form
pub fn convert(hex_digest: &str) -> Result<String> {
    let hex_digest = hex_digest.trim();
    if hex_digest.len() != LEGACY_DIGEST_HEX_LEN {
        return Err(Error::DigestError(format!(
            "expected {} hex characters, got {}",
            LEGACY_DIGEST_HEX_LEN,
            hex_digest.len()
        )));
    }

    let mut bytes = hex::decode(hex_digest)
        .map_err(|e| Error::DigestError(format!("{hex_digest}: {e}")))?;

    // Undo the +128 shift of the legacy encoding
    for byte in &mut bytes {
        *byte = byte.wrapping_sub(128);
    }

    Ok(STANDARD.encode(bytes))
}

/// When the converter rewrites account digests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestPolicy {
    /// Convert only for archives older than `DIGEST_BASE64_VERSION`
    #[default]
    Auto,
    /// Always treat digests as legacy hex
    Always,
    /// Never convert
    Never,
}

impl DigestPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            DigestPolicy::Auto => "auto",
            DigestPolicy::Always => "always",
            DigestPolicy::Never => "never",
        }
    }
}

impl FromStr for DigestPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(DigestPolicy::Auto),
            "always" => Ok(DigestPolicy::Always),
            "never" => Ok(DigestPolicy::Never),
            _ => Err(format!("Invalid digest policy: {s}")),
        }
    }
}

/// Applies the configured policy to digests read from an archive
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestConverter {
    policy: DigestPolicy,
}

impl DigestConverter {
    pub fn new(policy: DigestPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DigestPolicy {
        self.policy
    }

    /// Whether digests from an archive of `format_version` must be converted
    pub fn applies_to(&self, format_version: u32) -> bool {
        match self.policy {
            DigestPolicy::Auto => format_version < DIGEST_BASE64_VERSION,
            DigestPolicy::Always => true,
            DigestPolicy::Never => false,
        }
    }

    /// Return the digest in current form for an archive of `format_version`
    pub fn normalize(&self, format_version: u32, digest: &str) -> Result<String> {
        if self.applies_to(format_version) {
            convert(digest)
        } else {
            Ok(digest.to_string())
        }
    }
}
