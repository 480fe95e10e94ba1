//! Content-store collaborator for Manifold.
//!
//! The naming layer never chunks, replicates or encrypts data itself; it
//! talks to a content store through the [`ContentStore`] trait. Every block
//! is immutable and identified by its BLAKE3 [`Key`](manifold_types::Key)
//! (domain-separated by [`ObjectKind`]).
//!
//! # Write completion
//!
//! A write returns its key immediately together with a [`StoreWait`]
//! completion signal. Callers that hand a key to someone else must await the
//! signal first; signals compose with [`StoreWait::join`].
//!
//! # Storage Backends
//!
//! - [`InMemoryContentStore`] -- `HashMap`-based store for tests and embedding
//! - [`DeferredContentStore`] -- holds completions back until flushed, for
//!   exercising write ordering
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written (content-addressing guarantees this).
//! 2. Concurrent reads are always safe.
//! 3. The store never interprets block contents.
//! 4. All backend errors are propagated, never silently ignored.

pub mod deferred;
pub mod error;
pub mod memory;
pub mod object;
pub mod reader;
pub mod traits;
pub mod wait;

pub use deferred::DeferredContentStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryContentStore;
pub use object::{ObjectKind, StoredObject};
pub use reader::{retrieve, ContentReader};
pub use traits::ContentStore;
pub use wait::{StoreWait, WriteCompleter};
