//! Manifest entries.

use std::fmt;

use chrono::{DateTime, Utc};
use manifold_types::Key;
use serde::{Deserialize, Serialize};

/// Content type marking an internal trie edge; the entry hash is the key of
/// the page below it.
pub const MANIFEST_TYPE: &str = "application/mfd-manifest+json";

/// Content type marking a resource pointer; the entry hash is a resource name.
pub const RESOURCE_TYPE: &str = "application/mfd-resource";

/// Disambiguation code attached to a lookup result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum EntryStatus {
    /// Exact match.
    #[default]
    Ok,
    /// The path ends at an internal edge with no index entry below it.
    Ambiguous,
}

impl EntryStatus {
    /// HTTP-style code for the status.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Ambiguous => 300,
        }
    }

    pub fn is_ok(&self) -> bool {
        *self == Self::Ok
    }
}

impl From<EntryStatus> for u16 {
    fn from(status: EntryStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u16> for EntryStatus {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0 | 200 => Ok(Self::Ok),
            300 => Ok(Self::Ambiguous),
            other => Err(format!("unknown entry status {other}")),
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// One record of a manifest page.
///
/// `path` is relative to the page holding the entry. `hash` is the hex key of
/// the content (or of the page below, for edges), or a resource name when
/// `content_type` is [`RESOURCE_TYPE`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub mode: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "EntryStatus::is_ok")]
    pub status: EntryStatus,
}

impl ManifestEntry {
    pub fn new(
        path: impl Into<String>,
        hash: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    /// An entry pointing at stored content.
    pub fn for_key(path: impl Into<String>, key: &Key, content_type: impl Into<String>) -> Self {
        Self::new(path, key.to_hex(), content_type)
    }

    /// A pathless entry pointing at the resource `name`.
    pub fn resource_pointer(name: impl Into<String>) -> Self {
        Self::new("", name, RESOURCE_TYPE)
    }

    pub(crate) fn edge(path: impl Into<String>) -> Self {
        Self::new(path, "", MANIFEST_TYPE)
    }

    pub fn is_manifest(&self) -> bool {
        self.content_type == MANIFEST_TYPE
    }

    pub fn is_resource(&self) -> bool {
        self.content_type == RESOURCE_TYPE
    }

    /// The content key this entry points at, if `hash` is a key.
    pub fn key(&self) -> Option<Key> {
        Key::from_hex(&self.hash).ok()
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_mod_time(mut self, mod_time: DateTime<Utc>) -> Self {
        self.mod_time = Some(mod_time);
        self
    }
}
