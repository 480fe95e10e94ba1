//! Ownership checks for resource writes.

use async_trait::async_trait;
use manifold_resolver::{MultiResolver, ResolverResult};
use manifold_types::{Address, Context, Header};

/// What the resource handler needs from the name registry.
#[async_trait]
pub trait OwnerValidator: Send + Sync {
    /// Whether `address` owns `name`.
    async fn validate_owner(&self, name: &str, address: &Address) -> ResolverResult<bool>;

    /// Registry header at `number` from the chain serving `name`.
    async fn header_by_number(&self, ctx: &Context, name: &str, number: u64) -> ResolverResult<Header>;
}

#[async_trait]
impl OwnerValidator for MultiResolver {
    async fn validate_owner(&self, name: &str, address: &Address) -> ResolverResult<bool> {
        MultiResolver::validate_owner(self, name, address).await
    }

    async fn header_by_number(&self, ctx: &Context, name: &str, number: u64) -> ResolverResult<Header> {
        MultiResolver::header_by_number(self, ctx, name, number).await
    }
}
