//! Error types for name resolution.

use manifold_types::ContextError;
use thiserror::Error;

/// Errors that can occur while resolving or validating a name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    /// No chain is registered for the name's TLD and there is no default chain.
    #[error("no resolver registered for tld {tld:?}")]
    NoResolver { tld: String },

    /// The backend has no record for the name.
    #[error("name not found: {name}")]
    NotFound { name: String },

    /// The backend has no owner recorded for the name hash.
    #[error("no owner for node {node}")]
    OwnerNotFound { node: String },

    /// The backend has no header at the requested height.
    #[error("no header at height {number}")]
    HeaderNotFound { number: u64 },

    /// The registry backend failed.
    #[error("resolver backend error: {0}")]
    Backend(String),

    /// The TLD token cannot be registered.
    #[error("invalid tld {tld:?}: {reason}")]
    InvalidTld { tld: String, reason: String },

    /// The request context ended before the backend answered.
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Convenience type alias for resolver operations.
pub type ResolverResult<T> = std::result::Result<T, ResolverError>;
