//! Results of [`Api::get`](crate::Api::get).

use manifold_manifest::ManifestEntry;
use manifold_store::ContentReader;
use manifold_types::Key;

use crate::error::{ApiError, ApiResult};

/// Why a resource pointer's multihash record could not be followed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeFailure {
    /// The record does not parse.
    Malformed(String),
    /// The record names a digest algorithm other than the store's.
    Unsupported { code: u64 },
}

/// Outcome of reading a path under a manifest root.
#[derive(Debug)]
pub enum GetOutcome {
    /// The path names stored content.
    Content {
        reader: ContentReader,
        mime: String,
        content_key: Key,
    },
    /// The path ends at an internal edge with no index entry below it.
    Ambiguous {
        entry: ManifestEntry,
        content_key: Option<Key>,
    },
    /// The path is a resource pointer whose latest update is raw data.
    ResourceData {
        name: String,
        data: Vec<u8>,
        content_type: String,
    },
    NotFound { reason: String },
    DecodeFailure(DecodeFailure),
}

impl GetOutcome {
    pub(crate) fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    /// HTTP-style status hint.
    pub fn status(&self) -> u16 {
        match self {
            Self::Content { .. } | Self::ResourceData { .. } => 200,
            Self::Ambiguous { .. } => 300,
            Self::NotFound { .. } => 404,
            Self::DecodeFailure(DecodeFailure::Malformed(_)) => 500,
            Self::DecodeFailure(DecodeFailure::Unsupported { .. }) => 422,
        }
    }

    /// `true` for content, resource data and ambiguous listings.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::NotFound { .. } | Self::DecodeFailure(_))
    }

    /// Turn the failure outcomes into errors, passing the others through.
    pub fn into_result(self) -> ApiResult<Self> {
        match self {
            Self::NotFound { reason } => Err(ApiError::NotFound(reason)),
            Self::DecodeFailure(DecodeFailure::Malformed(reason)) => {
                Err(ApiError::DecodeFailure(reason))
            }
            Self::DecodeFailure(DecodeFailure::Unsupported { code }) => {
                Err(ApiError::UnsupportedDigest { code })
            }
            other => Ok(other),
        }
    }
}
