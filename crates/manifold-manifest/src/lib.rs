//! Manifest tries for Manifold.
//!
//! A manifest maps paths to content keys. It is stored as a tree of
//! content-addressed pages (`{"entries":[…]}` JSON blocks); internal edges
//! carry the [`MANIFEST_TYPE`] content type and point at the key of the
//! page below them. A trie snapshot is identified by its root key.
//!
//! Editing never touches a stored page. [`ManifestTrie::add_entry`] and
//! [`ManifestTrie::delete_entry`] rewrite the in-memory pages along the edited
//! path; [`ManifestTrie::recalc_and_store`] writes the dirty pages bottom-up
//! and only returns the new root once every page has been stored.
//!
//! Pages below the root are loaded lazily, the first time a lookup, edit or
//! listing reaches them.

pub mod entry;
pub mod error;
pub mod page;
pub mod trie;
pub mod writer;

pub use entry::{EntryStatus, ManifestEntry, MANIFEST_TYPE, RESOURCE_TYPE};
pub use error::{ManifestError, ManifestResult};
pub use page::ManifestPage;
pub use trie::ManifestTrie;
pub use writer::ManifestWriter;
