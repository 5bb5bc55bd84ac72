//! Typed schema layer for Smarter API Manifests (SAM).
//!
//! A manifest is a versioned, kind-tagged document:
//!
//! ```yaml
//! apiVersion: smarter.sh/v1
//! kind: User
//! metadata:
//!   name: example_user
//!   description: an example user
//!   version: 1.0.0
//! spec:
//!   config:
//!     firstName: John
//!     ...
//! ```
//!
//! Every value in this crate is validated when it is constructed. [`Manifest`]
//! and [`Metadata`] expose getters only; the only way to obtain a different
//! manifest is to build a new one through a validating constructor, so a
//! partially valid manifest is never observable.
//!
//! Per-kind `spec` shapes live in [`specs`]; [`KindSpec`] is the closed union
//! over them.

pub mod error;
pub mod kind;
pub mod manifest;
pub mod metadata;
pub mod specs;
pub mod validators;

pub use error::{SchemaError, SchemaResult};
pub use kind::{Kind, KindFamily};
pub use manifest::{Manifest, API_VERSION};
pub use metadata::Metadata;
pub use specs::KindSpec;
