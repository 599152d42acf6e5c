// src/acl.rs

//! Access control entries and the import ACL merge
//!
//! Importing a resource replaces its access control list by principal: an
//! entry from the archive overwrites the live entry for the same principal, and
//! live entries whose principal the archive does not mention are dropped.
//!
//! ```text
//! existing {A:+r+w, B:+r-v}  merged with  archive {A:+r-v}  =>  {A:+r-v}
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

pub const PERMISSION_READ: u32 = 1;
pub const PERMISSION_WRITE: u32 = 2;
pub const PERMISSION_VIEW: u32 = 4;
pub const PERMISSION_CONTROL: u32 = 8;
pub const PERMISSION_DIRECT_PUBLISH: u32 = 16;

/// Permission letters in display order
const LETTERS: [(char, u32); 5] = [
    ('r', PERMISSION_READ),
    ('w', PERMISSION_WRITE),
    ('v', PERMISSION_VIEW),
    ('c', PERMISSION_CONTROL),
    ('d', PERMISSION_DIRECT_PUBLISH),
];

/// Allowed and denied permission bitmasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    pub allowed: u32,
    pub denied: u32,
}

impl PermissionSet {
    pub fn new(allowed: u32, denied: u32) -> Self {
        Self { allowed, denied }
    }

    /// Effective permissions: allowed minus denied
    pub fn effective(&self) -> u32 {
        self.allowed & !self.denied
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (letter, bit) in LETTERS {
            if self.allowed & bit != 0 {
                write!(f, "+{letter}")?;
            }
            if self.denied & bit != 0 {
                write!(f, "-{letter}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for PermissionSet {
    type Err = String;

    /// Parse the `+r+w-v` notation
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut set = PermissionSet::default();
        let mut chars = s.trim().chars();
        while let Some(sign) = chars.next() {
            let letter = chars
                .next()
                .ok_or_else(|| format!("Dangling '{sign}' in permission string: {s}"))?;
            let bit = LETTERS
                .iter()
                .find(|(l, _)| *l == letter)
                .map(|(_, b)| *b)
                .ok_or_else(|| format!("Unknown permission '{letter}' in: {s}"))?;
            match sign {
                '+' => set.allowed |= bit,
                '-' => set.denied |= bit,
                _ => return Err(format!("Expected '+' or '-' in permission string: {s}")),
            }
        }
        Ok(set)
    }
}

/// One principal's permissions on a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    /// Principal name, e.g. `GROUP:Users` or `USER:Admin`
    pub principal: String,
    pub permissions: PermissionSet,
    /// Entry derived from a parent folder rather than set on the resource
    #[serde(default)]
    pub inherited: bool,
}

impl AccessControlEntry {
    pub fn new(principal: &str, permissions: PermissionSet) -> Self {
        Self {
            principal: principal.to_string(),
            permissions,
            inherited: false,
        }
    }

    /// Convenience constructor from the textual notation
    pub fn parse(principal: &str, permissions: &str) -> Result<Self, String> {
        Ok(Self::new(principal, permissions.parse()?))
    }
}

/// Result of merging an archive ACL over a live one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclMerge {
    /// The ACL to store
    pub entries: Vec<AccessControlEntry>,
    /// Principals present before and replaced by the archive
    pub overwritten: Vec<String>,
    /// Principals dropped because the archive does not mention them
    pub removed: Vec<String>,
}

/// Merge `manifest` over `existing` with replace-by-principal semantics
///
/// Inherited entries are never stored on the resource and are ignored on both
/// sides. When the archive names a principal twice, the later entry wins.
pub fn merge(existing: &[AccessControlEntry], manifest: &[AccessControlEntry]) -> AclMerge {
    let current: HashMap<&str, &AccessControlEntry> = existing
        .iter()
        .filter(|ace| !ace.inherited)
        .map(|ace| (ace.principal.as_str(), ace))
        .collect();

    let mut order: Vec<&str> = Vec::new();
    let mut incoming: HashMap<&str, &AccessControlEntry> = HashMap::new();
    for ace in manifest.iter().filter(|ace| !ace.inherited) {
        if incoming.insert(ace.principal.as_str(), ace).is_none() {
            order.push(ace.principal.as_str());
        }
    }

    let mut merged = AclMerge::default();
    for principal in order {
        if current.contains_key(principal) {
            merged.overwritten.push(principal.to_string());
        }
        merged.entries.push(incoming[principal].clone());
    }

    let removed: BTreeSet<&str> = current
        .keys()
        .copied()
        .filter(|p| !incoming.contains_key(p))
        .collect();
    merged.removed = removed.into_iter().map(str::to_string).collect();

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ace(principal: &str, perms: &str) -> AccessControlEntry {
        AccessControlEntry::parse(principal, perms).unwrap()
    }

    #[test]
    fn test_permission_notation() {
        let set: PermissionSet = "+r+w-v".parse().unwrap();
        assert_eq!(set.allowed, PERMISSION_READ | PERMISSION_WRITE);
        assert_eq!(set.denied, PERMISSION_VIEW);
        assert_eq!(set.to_string(), "+r+w-v");
        assert_eq!(set.effective(), PERMISSION_READ | PERMISSION_WRITE);

        assert_eq!("".parse::<PermissionSet>().unwrap(), PermissionSet::default());
        assert!("+x".parse::<PermissionSet>().is_err());
        assert!("*r".parse::<PermissionSet>().is_err());
        assert!("+".parse::<PermissionSet>().is_err());
    }

    #[test]
    fn test_merge_replaces_by_principal() {
        let existing = vec![ace("A", "+r+w"), ace("B", "+r-v")];
        let manifest = vec![ace("A", "+r-v")];

        let merged = merge(&existing, &manifest);
        assert_eq!(merged.entries, vec![ace("A", "+r-v")]);
        assert_eq!(merged.overwritten, vec!["A".to_string()]);
        assert_eq!(merged.removed, vec!["B".to_string()]);
    }

    #[test]
    fn test_merge_empty_manifest_clears_acl() {
        let existing = vec![ace("A", "+r"), ace("B", "+w")];
        let merged = merge(&existing, &[]);
        assert!(merged.entries.is_empty());
        assert_eq!(merged.removed, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_merge_adds_new_principals() {
        let merged = merge(&[], &[ace("C", "+r+v")]);
        assert_eq!(merged.entries, vec![ace("C", "+r+v")]);
        assert!(merged.overwritten.is_empty());
        assert!(merged.removed.is_empty());
    }

    #[test]
    fn test_merge_ignores_inherited_entries() {
        let mut inherited = ace("P", "+r");
        inherited.inherited = true;
        let merged = merge(&[inherited.clone()], &[inherited, ace("A", "+w")]);
        assert_eq!(merged.entries, vec![ace("A", "+w")]);
        assert!(merged.removed.is_empty());
    }

    #[test]
    fn test_merge_duplicate_principal_last_wins() {
        let merged = merge(&[], &[ace("A", "+r"), ace("A", "+w")]);
        assert_eq!(merged.entries, vec![ace("A", "+w")]);
    }
}
