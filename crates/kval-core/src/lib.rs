//! # kval-core: Foundational Types for kval
//!
//! Every other crate in the workspace depends on `kval-core`; it depends on
//! nothing internal.
//!
//! ## Contents
//!
//! - [`gvk`]: `GroupVersion`, `GroupVersionKind` and the `TypeMeta` header
//!   every manifest carries.
//! - [`field`]: field paths and field-scoped validation errors, rendered
//!   the way the Kubernetes API server renders them.
//! - [`status`]: the API `Status` record used for machine-readable reports
//!   (success / invalid / internal error).
//! - [`naming`]: DNS-1123 / DNS-1035 / qualified-name / label-value checks.
//! - [`yaml`]: YAML→JSON conversion and multi-document splitting.
//! - [`once_map`]: a keyed cache where each key is built at most once, even
//!   under concurrent lookups.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `kval-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod field;
pub mod gvk;
pub mod naming;
pub mod once_map;
pub mod status;
pub mod yaml;

pub use error::CoreError;
pub use field::{ErrorList, ErrorType, FieldError, Path};
pub use gvk::{GroupVersion, GroupVersionKind, TypeMeta, CORE_GROUP};
pub use once_map::OnceMap;
pub use status::{Status, StatusCause, StatusDetails, StatusOutcome, StatusReason};
