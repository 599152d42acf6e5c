// src/resource.rs

//! Resource identity and metadata types
//!
//! A resource is identified twice. The **structure id** names one path
//! instance together with its metadata; the **resource id** names the content
//! body. Siblings are structure ids sharing a resource id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|e| format!("Invalid {}: {s}: {e}", stringify!($name)))
            }
        }
    };
}

uuid_id!(
    /// Identity of one path/sibling instance
    StructureId
);

uuid_id!(
    /// Identity of a shared content body
    ResourceId
);

/// The pair of ids a live resource carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub structure_id: StructureId,
    pub resource_id: ResourceId,
}

/// Resource types known to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Folder,
    Plain,
    Binary,
    Image,
    XmlContent,
    Pointer,
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Folder => "folder",
            ResourceType::Plain => "plain",
            ResourceType::Binary => "binary",
            ResourceType::Image => "image",
            ResourceType::XmlContent => "xmlcontent",
            ResourceType::Pointer => "pointer",
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ResourceType::Folder)
    }

    /// Parse a type name, falling back to `Plain` for unknown names
    ///
    /// The boolean is false when the fallback was used.
    pub fn from_name_lossy(name: &str) -> (Self, bool) {
        match name.parse() {
            Ok(t) => (t, true),
            Err(_) => (ResourceType::Plain, false),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "folder" => Ok(ResourceType::Folder),
            "plain" => Ok(ResourceType::Plain),
            "binary" => Ok(ResourceType::Binary),
            "image" => Ok(ResourceType::Image),
            "xmlcontent" => Ok(ResourceType::XmlContent),
            "pointer" => Ok(ResourceType::Pointer),
            _ => Err(format!("Invalid resource type: {s}")),
        }
    }
}

/// Publish state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// Created since the last publish
    New,
    /// Modified since the last publish
    Changed,
    /// Identical to the published version
    Unchanged,
}

impl ResourceState {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceState::New => "new",
            ResourceState::Changed => "changed",
            ResourceState::Unchanged => "unchanged",
        }
    }
}

impl FromStr for ResourceState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "new" => Ok(ResourceState::New),
            "changed" => Ok(ResourceState::Changed),
            "unchanged" => Ok(ResourceState::Unchanged),
            _ => Err(format!("Invalid resource state: {s}")),
        }
    }
}

/// Per-structure metadata carried through export and import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub date_created: DateTime<Utc>,
    pub date_last_modified: DateTime<Utc>,
    pub user_created: String,
    pub user_last_modified: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub flags: u32,
}

impl ResourceMetadata {
    /// Fresh metadata stamped now for `user`
    pub fn now(user: &str) -> Self {
        let now = Utc::now();
        Self {
            date_created: now,
            date_last_modified: now,
            user_created: user.to_string(),
            user_last_modified: user.to_string(),
            locale: None,
            flags: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip_text() {
        let id = StructureId::new();
        let parsed: StructureId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_resource_type_names() {
        assert_eq!("xmlcontent".parse::<ResourceType>().unwrap(), ResourceType::XmlContent);
        assert_eq!(ResourceType::Folder.as_str(), "folder");
        assert!(ResourceType::Folder.is_folder());
        assert_eq!(ResourceType::from_name_lossy("jsp"), (ResourceType::Plain, false));
        assert_eq!(ResourceType::from_name_lossy("image"), (ResourceType::Image, true));
    }

    #[test]
    fn test_state_names() {
        for state in [ResourceState::New, ResourceState::Changed, ResourceState::Unchanged] {
            assert_eq!(state.as_str().parse::<ResourceState>().unwrap(), state);
        }
    }
}
