// src/config.rs

//! Engine configuration
//!
//! Configuration is read from a TOML file. Every field has a default, so an
//! empty file (or no file at all) is a valid configuration.
//!
//! ```toml
//! [engine]
//! site_root = "/sites/default"
//! lock_owner = "admin"
//! digest_policy = "auto"
//! compression = "zstd"
//! link_types = ["xmlcontent"]
//!
//! [translation]
//! legacy_folders = true
//! sed = ["s#^/old/(.*)#/new/$1#"]
//!
//! [[translation.rule]]
//! pattern = "/default/vfs/(.*)"
//! replacement = "/$1"
//! ```

use crate::compression::CompressionFormat;
use crate::digest::{DigestConverter, DigestPolicy};
use crate::error::{Error, Result};
use crate::links::LinkParserRegistry;
use crate::path;
use crate::resource::ResourceType;
use crate::translator::{self, ResourceTranslator, RuleSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default config file looked up next to the database
pub const DEFAULT_CONFIG_FILE: &str = "vfsport.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub translation: TranslationSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Site root used when no root is given on the command line
    #[serde(default = "default_site_root")]
    pub site_root: String,
    /// Owner of the working locks left on imported resources
    #[serde(default = "default_lock_owner")]
    pub lock_owner: String,
    #[serde(default)]
    pub digest_policy: DigestPolicy,
    /// Compression for newly written archives
    #[serde(default)]
    pub compression: CompressionFormat,
    /// Resource types whose content carries links
    #[serde(default = "default_link_types")]
    pub link_types: Vec<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            site_root: default_site_root(),
            lock_owner: default_lock_owner(),
            digest_policy: DigestPolicy::default(),
            compression: CompressionFormat::default(),
            link_types: default_link_types(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationSection {
    /// Append the built-in legacy folder rules after the configured ones
    #[serde(default)]
    pub legacy_folders: bool,
    /// Rules in sed form, tried after `rule` tables
    #[serde(default)]
    pub sed: Vec<String>,
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleSpec>,
}

fn default_site_root() -> String {
    "/".to_string()
}

fn default_lock_owner() -> String {
    "admin".to_string()
}

fn default_link_types() -> Vec<String> {
    vec![ResourceType::XmlContent.as_str().to_string()]
}

impl EngineConfig {
    /// Load a config file
    pub fn load(file: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(file).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {e}", file.display()))
        })?;
        let config = Self::parse(&content)?;
        debug!("Loaded configuration from {}", file.display());
        Ok(config)
    }

    /// Load `file` if it exists, defaults otherwise
    pub fn load_or_default(file: &Path) -> Result<Self> {
        if file.exists() {
            Self::load(file)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        path::sanitize(&self.engine.site_root)
            .map_err(|e| Error::ConfigError(format!("site_root: {e}")))?;
        if self.engine.lock_owner.trim().is_empty() {
            return Err(Error::ConfigError("lock_owner must not be empty".to_string()));
        }
        self.link_parsers()?;
        Ok(())
    }

    /// Build the translator from rule tables, sed rules and legacy rules, in that order
    pub fn translator(&self) -> Result<ResourceTranslator> {
        let mut specs = self.translation.rules.clone();
        for rule in &self.translation.sed {
            specs.push(RuleSpec::parse_sed(rule)?);
        }
        if self.translation.legacy_folders {
            specs.extend(translator::legacy_folder_rules());
        }
        ResourceTranslator::new(&specs)
    }

    pub fn digest_converter(&self) -> DigestConverter {
        DigestConverter::new(self.engine.digest_policy)
    }

    /// Parsers for the configured link-parseable types
    pub fn link_parsers(&self) -> Result<LinkParserRegistry> {
        let available = LinkParserRegistry::with_defaults();
        let mut registry = LinkParserRegistry::new();
        for name in &self.engine.link_types {
            let resource_type: ResourceType = name
                .parse()
                .map_err(|e| Error::ConfigError(format!("link_types: {e}")))?;
            let parser = available.get_shared(resource_type).ok_or_else(|| {
                Error::ConfigError(format!("no link parser for type {resource_type}"))
            })?;
            registry.register(resource_type, parser);
        }
        Ok(registry)
    }
}
