//! # CustomResourceDefinition Handling
//!
//! Definitions are checked against a hand-maintained model instead of the
//! published schema, which is self-referential (`JSONSchemaProps`) and so
//! cannot be turned into a structural schema.

mod strategy;
mod types;

pub use strategy::{validate_custom_resource_definition, CrdStrategy};
pub use types::{
    CustomResourceConversion, CustomResourceDefinition, CustomResourceDefinitionNames,
    CustomResourceDefinitionSpec, CustomResourceDefinitionVersion, CustomResourceValidation,
    CRD_GROUP, CRD_KIND,
};

use kval_core::yaml::parse_yaml;
use kval_core::GroupVersionKind;

use crate::admission::before_create;
use crate::error::DocumentError;
use crate::meta::fill_object_meta_system_fields;

/// Whether `gvk` is a definition and must bypass schema resolution.
pub fn is_crd(gvk: &GroupVersionKind) -> bool {
    gvk.group == CRD_GROUP && gvk.kind == CRD_KIND
}

/// Decode a definition from either served version into the v1 layout,
/// with server defaults applied.
pub fn decode(document: &str) -> Result<CustomResourceDefinition, DocumentError> {
    let value = parse_yaml(document).map_err(|e| DocumentError::Parse(e.to_string()))?;
    let mut crd: CustomResourceDefinition = serde_json::from_value(value)
        .map_err(|e| DocumentError::Internal(format!("failed to decode {CRD_KIND}: {e}")))?;
    if crd.served_version() == "v1beta1" {
        crd.fold_v1beta1();
    }
    crd.apply_defaults();
    Ok(crd)
}

/// Decode and run the create checks for one definition document.
pub fn validate_document(document: &str) -> Result<(), DocumentError> {
    let mut crd = decode(document)?;
    fill_object_meta_system_fields(&mut crd.metadata);
    before_create(&CrdStrategy, "", &mut crd)
}
