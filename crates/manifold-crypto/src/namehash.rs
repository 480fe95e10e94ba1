//! Recursive name hashing.
//!
//! Registries index names by a fixed-size node hash rather than by text.
//! The node of `a.b.c` is derived label by label from the right:
//!
//! ```text
//! node("")      = 0x00…00
//! node(l.rest)  = H(node(rest) ‖ H(l))
//! ```
//!
//! so the node of a subdomain can be computed from its parent's node without
//! knowing the parent's text.

use crate::hasher::ContentHasher;

/// Compute the registry node hash of a dotted name.
pub fn name_hash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = ContentHasher::NAME.hash(label.as_bytes());
        node = *ContentHasher::NAME
            .hash_parts(&[&node, label_hash.as_bytes()])
            .as_bytes();
    }
    node
}
