//! # kval-manifest: Manifest Validation
//!
//! Validates Kubernetes manifests file by file, document by document, the
//! way the API server would check them on create.
//!
//! ## Flow
//!
//! ```text
//! file ──▶ documents ──▶ TypeMeta ──┬─ CustomResourceDefinition ──▶ crd (native model)
//!                                   └─ anything else ──▶ ValidatorFactory
//!                                        ──▶ strict decode ──▶ normalize
//!                                        ──▶ before_create (schema, CEL, lists, ObjectMeta)
//! ```
//!
//! Every document ends up as a [`DocumentOutcome`], collected per file in a
//! [`FilesErrors`] report.
//!
//! ## Crate Policy
//!
//! - Depends on `kval-core`, `kval-openapi` and `kval-schema` internally.
//! - A failing document never stops the run.
//! - No `.unwrap()` outside tests.

pub mod admission;
pub mod crd;
pub mod error;
pub mod meta;
pub mod normalize;
pub mod report;
pub mod validator;

pub use admission::{before_create, CustomResourceStrategy, RestCreateStrategy};
pub use error::{DocumentError, DocumentOutcome};
pub use meta::{ObjectMetaAccess, Unstructured};
pub use report::{FilesErrors, Summary};
pub use validator::ManifestValidator;
