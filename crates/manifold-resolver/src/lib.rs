//! Name resolution for Manifold.
//!
//! Human-readable names are turned into content keys by registry backends
//! implementing [`ResolveValidator`]. A [`MultiResolver`] groups backends into
//! chains keyed by top-level domain and applies the selection policy:
//!
//! - a chain registered for the name's exact TLD is used on its own;
//! - otherwise the default (`""`) chain is used;
//! - within a chain, backends are tried in registration order and the first
//!   success wins.
//!
//! [`StaticResolver`] is an in-memory backend for embedding and tests.

pub mod chain;
pub mod error;
pub mod memory;
pub mod names;
pub mod traits;

pub use chain::{MultiResolver, MultiResolverBuilder, NameHashFn};
pub use error::{ResolverError, ResolverResult};
pub use memory::StaticResolver;
pub use traits::{NameResolver, ResolveValidator};
