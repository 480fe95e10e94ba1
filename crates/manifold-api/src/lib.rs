//! High-level API for Manifold.
//!
//! [`Api`] ties the naming layer together: it turns addresses into content
//! keys through a [`NameResolver`](manifold_resolver::NameResolver), reads and
//! edits manifests, follows resource pointers and forwards resource
//! operations to a [`ResourceHandler`](manifold_resource::ResourceHandler).
//!
//! Every edit starts from a caller-supplied root and returns a new one; the
//! API itself keeps no state between calls.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use manifold_api::{Api, GetOutcome};
//! use manifold_resource::InMemoryResourceHandler;
//! use manifold_store::{ContentStore, InMemoryContentStore};
//!
//! # async fn demo() -> manifold_api::ApiResult<()> {
//! let store: Arc<dyn ContentStore> = Arc::new(InMemoryContentStore::new());
//! let resources = Arc::new(InMemoryResourceHandler::new(Arc::clone(&store)));
//! let api = Api::new(store, None, resources);
//!
//! let (root, wait) = api.put(b"<h1>hi</h1>", "text/html", false)?;
//! wait.wait().await?;
//! if let GetOutcome::Content { reader, mime, .. } = api.get(root, "").await? {
//!     assert_eq!(mime, "text/html");
//!     assert_eq!(&reader.read_all()?[..], b"<h1>hi</h1>");
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod outcome;

pub use api::Api;
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use outcome::{DecodeFailure, GetOutcome};
