use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Header of a block in the registry chain that backs name resolution.
///
/// Callers checking name ownership use headers as proof material: the
/// ownership answer is only meaningful relative to a specific block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Block height.
    pub number: u64,
    /// Hash of this block.
    pub hash: Key,
    /// Hash of the parent block.
    pub parent_hash: Key,
    /// Block timestamp in seconds since UNIX epoch.
    pub timestamp: u64,
}

impl Header {
    pub fn new(number: u64, hash: Key, parent_hash: Key, timestamp: u64) -> Self {
        Self {
            number,
            hash,
            parent_hash,
            timestamp,
        }
    }

    /// Returns `true` if `self` directly follows `parent`.
    pub fn follows(&self, parent: &Header) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}
