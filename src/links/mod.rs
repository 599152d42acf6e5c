// src/links/mod.rs

//! Link tables of structured content
//!
//! Some resource types carry links to other resources inside their content.
//! A [`LinkParser`] extracts those links into a link table, rewrites their
//! targets after an import has moved things around, and validates content
//! before it is written. [`LinkParserRegistry`] maps resource types to the
//! parser that understands them.

mod rewriter;
mod xml;

pub use rewriter::{BrokenLink, LinkFixup, LinkResolver, LinkTarget, SessionTarget};
pub use xml::XmlLinkParser;

use crate::error::Result;
use crate::relation::RelationType;
use crate::resource::{ResourceType, StructureId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One link found in structured content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTableEntry {
    /// Name of the link element within the content
    pub element: String,
    /// Target path as written in the content, including any `#` or `?` suffix
    pub target: String,
    /// Target structure id recorded next to the path, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<StructureId>,
    pub relation_type: RelationType,
}

impl LinkTableEntry {
    /// Whether the target points outside the repository
    pub fn is_external(&self) -> bool {
        !self.target.starts_with('/')
    }

    /// The target split into repository path and `#`/`?` suffix
    pub fn split_target(&self) -> (&str, &str) {
        split_suffix(&self.target)
    }
}

/// Split `/a/b.html#top` into `/a/b.html` and `#top`
pub fn split_suffix(target: &str) -> (&str, &str) {
    match target.find(['#', '?']) {
        Some(idx) => target.split_at(idx),
        None => (target, ""),
    }
}

/// New target for one link element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRewrite {
    pub element: String,
    pub target: String,
    pub target_id: Option<StructureId>,
}

/// Capability of resource types whose content holds links
pub trait LinkParser: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Extract the link table
    fn parse(&self, content: &[u8]) -> Result<Vec<LinkTableEntry>>;

    /// Apply new link targets, leaving everything else untouched
    fn rewrite(&self, content: &[u8], rewrites: &[LinkRewrite]) -> Result<Vec<u8>>;

    /// Check that content is well formed; the error describes the first problem
    fn validate(&self, content: &[u8]) -> std::result::Result<(), String>;
}

/// Resource type to link parser mapping
#[derive(Clone, Default)]
pub struct LinkParserRegistry {
    parsers: HashMap<ResourceType, Arc<dyn LinkParser>>,
}

impl LinkParserRegistry {
    /// A registry with no parseable types
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in XML parser for structured content
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ResourceType::XmlContent, Arc::new(XmlLinkParser));
        registry
    }

    pub fn register(&mut self, resource_type: ResourceType, parser: Arc<dyn LinkParser>) {
        self.parsers.insert(resource_type, parser);
    }

    pub fn get(&self, resource_type: ResourceType) -> Option<&dyn LinkParser> {
        self.parsers.get(&resource_type).map(|p| p.as_ref())
    }

    /// Shared handle to a parser, for registering it elsewhere
    pub fn get_shared(&self, resource_type: ResourceType) -> Option<Arc<dyn LinkParser>> {
        self.parsers.get(&resource_type).cloned()
    }

    pub fn is_parseable(&self, resource_type: ResourceType) -> bool {
        self.parsers.contains_key(&resource_type)
    }

    pub fn types(&self) -> Vec<ResourceType> {
        let mut types: Vec<_> = self.parsers.keys().copied().collect();
        types.sort_by_key(|t| t.as_str().to_string());
        types
    }
}

impl std::fmt::Debug for LinkParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkParserRegistry")
            .field("types", &self.types())
            .finish()
    }
}
