//! Mutable resources for Manifold.
//!
//! A resource is a named, owner-controlled pointer whose value changes over
//! time while every value ever written stays an immutable block. Time is
//! measured in registry blocks: a resource created at block `start` with
//! update frequency `f` is in period `(current - start) / f + 1`, and each
//! update within a period gets the next version number.
//!
//! An update either carries raw data or, when written with
//! [`ResourceHandler::update_multihash`], a multihash record naming a
//! manifest root.
//!
//! [`InMemoryResourceHandler`] implements [`ResourceHandler`] on top of any
//! [`ContentStore`](manifold_store::ContentStore), optionally checking
//! ownership through an [`OwnerValidator`].

pub mod error;
pub mod handler;
pub mod memory;
pub mod update;
pub mod validator;

pub use error::{ResourceError, ResourceResult};
pub use handler::{Resource, ResourceHandler, ResourceLookupParams};
pub use memory::InMemoryResourceHandler;
pub use update::ResourceUpdate;
pub use validator::OwnerValidator;
