//! The stored form of one trie page.

use serde::{Deserialize, Serialize};

use crate::entry::ManifestEntry;

/// A manifest page as stored: `{"entries":[…]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPage {
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

impl ManifestPage {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// A page holding a single entry.
    pub fn single(entry: ManifestEntry) -> Self {
        Self::new(vec![entry])
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
