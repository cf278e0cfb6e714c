//! # kval-openapi: Layered OpenAPI Schema Resolution
//!
//! Answers one question for the rest of kval: "what is the OpenAPI v3
//! document for this group-version?"
//!
//! ## Architecture
//!
//! Every provider and every combinator implements [`SchemaSource`]. A
//! resolution chain is a tree of boxed sources:
//!
//! - [`Fallback`]: first source that finds the document wins.
//! - [`Composite`]: all sources are merged, earliest source wins per key.
//! - [`Overlay`]: a [`PatchLoader`] edits whatever the base source returns.
//!
//! Leaves live in [`providers`]: local schema files, local CRD files,
//! documents embedded in the binary, release documents on GitHub, and the
//! live cluster's `/openapi/v3` endpoint.
//!
//! ## Crate Policy
//!
//! - Depends only on `kval-core` internally.
//! - Sources are `Send + Sync`; remote and crawled results are cached for
//!   the lifetime of the source.
//! - Network access happens only inside [`providers::GitHubBuiltins`] and
//!   [`providers::ClusterSource`].

pub mod composite;
pub mod document;
mod embedded;
pub mod error;
pub mod fallback;
mod http;
pub mod overlay;
pub mod patch;
pub mod providers;
pub mod source;

pub use composite::Composite;
pub use document::{Scope, SchemaDocument};
pub use embedded::normalize_version;
pub use error::{PatchError, SourceError};
pub use fallback::Fallback;
pub use overlay::Overlay;
pub use patch::{DirectoryPatchLoader, EmbeddedPatchLoader, Patch, PatchLoader, PatchOperation};
pub use source::SchemaSource;
