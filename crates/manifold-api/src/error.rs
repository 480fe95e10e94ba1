use manifold_manifest::ManifestError;
use manifold_resolver::ResolverError;
use manifold_resource::ResourceError;
use manifold_store::StoreError;
use manifold_types::{ContextError, TypeError};

/// Errors from API operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The address text could not be parsed.
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// The address parsed but cannot be turned into a key.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no resolver for tld {tld:?}")]
    NoResolver { tld: String },

    #[error("resolution failed: {0}")]
    ResolutionFailed(ResolverError),

    #[error("not found: {0}")]
    NotFound(String),

    /// A multihash record could not be decoded.
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// A multihash record names an algorithm other than the store's.
    #[error("unsupported digest algorithm {code:#x}")]
    UnsupportedDigest { code: u64 },

    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("configuration error: {0}")]
    Config(String),
}

impl ApiError {
    /// HTTP-style status hint for the error.
    pub fn status(&self) -> u16 {
        match self {
            Self::MalformedAddress(_) | Self::InvalidAddress(_) | Self::InvalidArgument(_) => 400,
            Self::NoResolver { .. } | Self::ResolutionFailed(_) | Self::NotFound(_) => 404,
            Self::DecodeFailure(_) => 500,
            Self::UnsupportedDigest { .. } => 422,
            Self::Store(StoreError::NotFound(_)) => 404,
            Self::Store(_) => 500,
            Self::Manifest(ManifestError::NotFound(_)) => 404,
            Self::Manifest(ManifestError::Store(StoreError::NotFound(_))) => 404,
            Self::Manifest(ManifestError::Cancelled) => 499,
            Self::Manifest(_) => 500,
            Self::Resource(e) => resource_status(e),
            Self::Cancelled => 499,
            Self::DeadlineExceeded => 504,
            Self::Config(_) => 500,
        }
    }
}

fn resource_status(err: &ResourceError) -> u16 {
    match err {
        ResourceError::NotFound { .. }
        | ResourceError::NoUpdate { .. }
        | ResourceError::NotSynced { .. }
        | ResourceError::LookupLimit { .. } => 404,
        ResourceError::InvalidValue(_)
        | ResourceError::DataTooLarge { .. }
        | ResourceError::InvalidMultihash(_) => 400,
        ResourceError::Unauthorized { .. } => 403,
        ResourceError::AlreadyExists { .. } => 409,
        ResourceError::Context(ContextError::Cancelled) => 499,
        ResourceError::Context(ContextError::DeadlineExceeded) => 504,
        ResourceError::Store(StoreError::NotFound(_)) => 404,
        _ => 500,
    }
}

impl From<TypeError> for ApiError {
    fn from(err: TypeError) -> Self {
        Self::MalformedAddress(err.to_string())
    }
}

impl From<ResolverError> for ApiError {
    fn from(err: ResolverError) -> Self {
        match err {
            ResolverError::NoResolver { tld } => Self::NoResolver { tld },
            ResolverError::Context(ctx) => ctx.into(),
            other => Self::ResolutionFailed(other),
        }
    }
}

impl From<ContextError> for ApiError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Result alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
