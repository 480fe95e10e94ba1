//! Backend traits for name resolution.

use async_trait::async_trait;
use manifold_types::{Address, Context, Header, Key};

use crate::error::ResolverResult;

/// The narrow capability the façade needs: turn a name into a root key.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> ResolverResult<Key>;
}

/// A registry backend.
///
/// Besides resolving names it answers ownership queries (keyed by the name
/// hash) and serves registry headers, which resource owners use as proof
/// material.
#[async_trait]
pub trait ResolveValidator: Send + Sync {
    /// Content key currently registered for `name`.
    async fn resolve(&self, name: &str) -> ResolverResult<Key>;

    /// Owner of the name whose hash is `node`.
    async fn owner(&self, node: [u8; 32]) -> ResolverResult<Address>;

    /// Registry header at height `number`.
    async fn header_by_number(&self, ctx: &Context, number: u64) -> ResolverResult<Header>;
}
