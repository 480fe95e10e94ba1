//! Foundation types for Manifold.
//!
//! This crate provides the identifiers and request-scoped types shared by
//! every other Manifold crate.
//!
//! # Key Types
//!
//! - [`Key`] — Content-addressed block identifier (32-byte digest)
//! - [`Address`] — 20-byte account address that owns a registered name
//! - [`Header`] — Registry chain header used as ownership proof material
//! - [`Context`] — Cancellation token plus optional deadline for round trips
//! - [`Uri`] — Parsed `scheme:/address/path` reference

pub mod address;
pub mod context;
pub mod error;
pub mod header;
pub mod key;
pub mod uri;

pub use address::Address;
pub use context::{Context, ContextError};
pub use error::TypeError;
pub use header::Header;
pub use key::Key;
pub use uri::{Scheme, Uri};
