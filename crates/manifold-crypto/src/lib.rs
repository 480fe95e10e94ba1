//! Hashing primitives for Manifold.
//!
//! Provides domain-separated BLAKE3 block hashing, recursive name hashing for
//! registry lookups, and the self-describing multihash digest records that
//! resources use to point at manifest roots.
//!
//! Digests come from the `blake3` crate; nothing here implements a hash.

pub mod hasher;
pub mod multihash;
pub mod namehash;

pub use hasher::ContentHasher;
pub use multihash::{Multihash, MultihashError, BLAKE3_256, KECCAK_256, SHA2_256};
pub use namehash::name_hash;
