//! # kval-schema: Structural Schemas and Validator Bundles
//!
//! Turns a resolved OpenAPI document into everything needed to check an
//! object of one kind.
//!
//! ## Pipeline
//!
//! ```text
//! SchemaSource ──▶ SchemaDocument ──▶ Structural ──┬─▶ Decoder (strict, defaults)
//!                  (per group-version) (per GVK)   └─▶ SchemaValidator
//!                                                       ├─ JSON Schema (jsonschema)
//!                                                       ├─ CEL rules (cel-interpreter)
//!                                                       └─ list-type uniqueness
//! ```
//!
//! [`ValidatorFactory`] drives the pipeline and caches one [`Validators`]
//! bundle per GVK for the life of the run.
//!
//! ## Crate Policy
//!
//! - Depends on `kval-core` and `kval-openapi` internally.
//! - Bundles are immutable once built and shared behind `Arc`.
//! - No `.unwrap()` outside tests.

mod cel;
pub mod decoder;
pub mod error;
pub mod factory;
pub mod structural;
mod translate;
pub mod validator;
pub mod validators;

pub use decoder::Decoder;
pub use error::{DecodeError, FactoryError};
pub use factory::ValidatorFactory;
pub use structural::{
    AdditionalProperties, Extensions, ListType, Structural, StructuralError, ValidationRule,
    ValueValidation,
};
pub use validator::SchemaValidator;
pub use validators::{ObjectTyper, Validators};
