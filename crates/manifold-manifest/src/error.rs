use manifold_store::StoreError;
use manifold_types::Key;

/// Errors from manifest operations.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// No block exists for the manifest page key.
    #[error("manifest not found: {0}")]
    NotFound(Key),

    /// The block exists but is not a readable manifest page.
    #[error("cannot decode manifest {key}: {reason}")]
    Decode { key: Key, reason: String },

    /// An entry cannot be placed in a trie.
    #[error("invalid manifest entry {path:?}: {reason}")]
    InvalidEntry { path: String, reason: String },

    /// Page encoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The walk was cancelled before it finished.
    #[error("manifest operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;
