// src/translator.rs

//! Resource path translation
//!
//! Archives written by older repository layouts carry paths that no longer
//! exist in the current folder structure. A `ResourceTranslator` holds an
//! ordered list of regex rules; the first rule whose pattern matches the whole
//! path produces the translated path and later rules are not consulted.
//!
//! Rules are compiled once, when the translator is built. A malformed pattern
//! is a configuration error and never surfaces from `translate`.
//!
//! # Example
//!
//! ```
//! use vfsport::translator::{ResourceTranslator, RuleSpec};
//!
//! let translator = ResourceTranslator::new(&[RuleSpec::new(
//!     "/default/vfs/pics/(.*)",
//!     "/default/vfs/system/galleries/pics/$1",
//! )])?;
//! assert_eq!(
//!     translator.translate("/default/vfs/pics/logo.png"),
//!     "/default/vfs/system/galleries/pics/logo.png"
//! );
//! # Ok::<(), vfsport::Error>(())
//! ```

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Uncompiled rule as it appears in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    pub replacement: String,
}

impl RuleSpec {
    pub fn new(pattern: &str, replacement: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        }
    }

    /// Parse a rule written in sed form, e.g. `s#^/old/(.*)#/new/$1#`
    ///
    /// The character following `s` is the delimiter.
    pub fn parse_sed(rule: &str) -> Result<Self> {
        let rule = rule.trim();
        let mut chars = rule.chars();
        if chars.next() != Some('s') {
            return Err(Error::ConfigError(format!(
                "Translation rule must start with 's': {rule}"
            )));
        }
        let delimiter = chars
            .next()
            .ok_or_else(|| Error::ConfigError(format!("Translation rule too short: {rule}")))?;

        let body = &rule[1 + delimiter.len_utf8()..];
        let parts: Vec<&str> = body.split(delimiter).collect();
        match parts.as_slice() {
            [pattern, replacement, flags] if flags.is_empty() => {
                Ok(Self::new(pattern, replacement))
            }
            _ => Err(Error::ConfigError(format!(
                "Translation rule must have the form s{d}pattern{d}replacement{d}: {rule}",
                d = delimiter
            ))),
        }
    }
}

/// A compiled translation rule
#[derive(Debug, Clone)]
pub struct TranslationRule {
    spec: RuleSpec,
    regex: Regex,
}

impl TranslationRule {
    /// Compile a rule, anchoring the pattern to the whole path
    pub fn compile(spec: RuleSpec) -> Result<Self> {
        let anchored = format!("^(?:{})$", spec.pattern);
        let regex = Regex::new(&anchored).map_err(|e| {
            Error::ConfigError(format!(
                "Invalid translation pattern '{}': {}",
                spec.pattern, e
            ))
        })?;
        Ok(Self { spec, regex })
    }

    pub fn pattern(&self) -> &str {
        &self.spec.pattern
    }

    pub fn replacement(&self) -> &str {
        &self.spec.replacement
    }

    fn apply(&self, path: &str) -> Option<String> {
        let caps = self.regex.captures(path)?;
        let mut out = String::with_capacity(path.len() + self.spec.replacement.len());
        caps.expand(&self.spec.replacement, &mut out);
        Some(out)
    }
}

/// Ordered, first-match-wins path translator
#[derive(Debug, Clone, Default)]
pub struct ResourceTranslator {
    rules: Vec<TranslationRule>,
}

impl ResourceTranslator {
    /// Build a translator from rule specs, compiling every pattern
    pub fn new(specs: &[RuleSpec]) -> Result<Self> {
        let rules = specs
            .iter()
            .cloned()
            .map(TranslationRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Translator with no rules; every path is returned unchanged
    pub fn identity() -> Self {
        Self::default()
    }

    /// Build a translator from sed-form rules
    pub fn from_sed_rules<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let specs = rules
            .iter()
            .map(|r| RuleSpec::parse_sed(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(&specs)
    }

    /// Translate a path; returns it unchanged when no rule matches
    pub fn translate(&self, path: &str) -> String {
        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(translated) = rule.apply(path) {
                trace!("Rule {} translated {} -> {}", index, path, translated);
                return translated;
            }
        }
        path.to_string()
    }

    /// Whether translating `path` again would change it
    pub fn is_stable(&self, path: &str) -> bool {
        self.translate(path) == path
    }

    pub fn rules(&self) -> &[TranslationRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Rules that move the pre-`/system/` folder layout into its current place
///
/// Order matters: `pics/system` must be tried before the generic `pics` rule.
pub fn legacy_folder_rules() -> Vec<RuleSpec> {
    [
        ("/default/vfs/moduledemos/(.*)", "/default/vfs/system/moduledemos/$1"),
        (
            "/default/vfs/pics/system/(.*)",
            "/default/vfs/system/workplace/resources/$1",
        ),
        ("/default/vfs/pics/(.*)", "/default/vfs/system/galleries/pics/$1"),
        (
            "/default/vfs/download/(.*)",
            "/default/vfs/system/galleries/download/$1",
        ),
        (
            "/default/vfs/externallinks/(.*)",
            "/default/vfs/system/galleries/externallinks/$1",
        ),
        (
            "/default/vfs/htmlgalleries/(.*)",
            "/default/vfs/system/galleries/htmlgalleries/$1",
        ),
        ("/default/vfs/content/(.*)", "/default/vfs/system/modules/default/$1"),
        (
            "/default/vfs/system/workplace/config/language/(.*)",
            "/default/vfs/system/workplace/locales/$1",
        ),
        (
            "/default/vfs/system/workplace/css/(.*)",
            "/default/vfs/system/workplace/resources/$1",
        ),
        (
            "/default/vfs/system/workplace/templates/js/(.*)",
            "/default/vfs/system/workplace/scripts/$1",
        ),
    ]
    .into_iter()
    .map(|(pattern, replacement)| RuleSpec::new(pattern, replacement))
    .collect()
}
