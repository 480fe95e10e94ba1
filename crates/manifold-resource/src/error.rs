use manifold_crypto::MultihashError;
use manifold_resolver::ResolverError;
use manifold_store::StoreError;
use manifold_types::ContextError;

/// Errors from resource operations.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// No resource with this name has been created.
    #[error("resource not found: {name}")]
    NotFound { name: String },

    /// The resource exists but has no update at or before the period.
    #[error("no update for {name} at period {period}")]
    NoUpdate { name: String, period: u32 },

    /// Content was requested before any lookup or update.
    #[error("resource {name} has not been synced")]
    NotSynced { name: String },

    #[error("resource already exists: {name}")]
    AlreadyExists { name: String },

    /// A caller-supplied argument is out of range.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The configured signer does not own the name.
    #[error("not the owner of {name}")]
    Unauthorized { name: String },

    #[error("update data is {size} bytes, limit is {max}")]
    DataTooLarge { size: usize, max: usize },

    #[error("invalid multihash: {0}")]
    InvalidMultihash(#[from] MultihashError),

    /// A lookup walked back more periods than allowed.
    #[error("lookup exceeded {max} periods")]
    LookupLimit { max: u32 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Result alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
