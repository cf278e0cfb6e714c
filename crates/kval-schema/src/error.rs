//! # Error Types
//!
//! `FactoryError` is what [`crate::ValidatorFactory`] reports when a GVK
//! cannot be turned into a validator bundle. `DecodeError` is what the
//! strict decoder reports for a single document.

use kval_core::GroupVersionKind;
use kval_openapi::SourceError;
use thiserror::Error;

use crate::structural::StructuralError;

#[derive(Error, Debug)]
pub enum FactoryError {
    /// No resolved document declares the GVK.
    #[error("failed to locate OpenAPI spec for GV: {group_version}, kind {kind}")]
    NotFound { group_version: String, kind: String },

    #[error("schema for {gvk} is not structural: {source}")]
    Schema {
        gvk: String,
        #[source]
        source: StructuralError,
    },

    /// The translated JSON Schema was rejected by the validator compiler.
    #[error("failed to compile schema for {gvk}: {reason}")]
    Compile { gvk: String, reason: String },

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl FactoryError {
    pub(crate) fn not_found(gvk: &GroupVersionKind) -> Self {
        let gv = gvk.group_version();
        Self::NotFound {
            group_version: gv.api_version(),
            kind: gvk.kind.clone(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{0}")]
    Syntax(String),

    #[error("document root must be an object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("the API version in the data ({found}) does not match the expected API version ({expected})")]
    VersionMismatch { expected: String, found: String },

    #[error("the kind in the data ({found}) does not match the expected kind ({expected})")]
    KindMismatch { expected: String, found: String },

    /// Strict-mode violations, each already rendered as
    /// `unknown field "spec.foo"`.
    #[error("strict decoding error: {}", .violations.join(", "))]
    Strict { violations: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_group_version_and_kind() {
        let err = FactoryError::not_found(&GroupVersionKind::new("acme.io", "v1", "Widget"));
        assert_eq!(
            err.to_string(),
            "failed to locate OpenAPI spec for GV: acme.io/v1, kind Widget"
        );
    }

    #[test]
    fn strict_errors_are_joined() {
        let err = DecodeError::Strict {
            violations: vec![
                "unknown field \"spec.foo\"".into(),
                "unknown field \"bar\"".into(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "strict decoding error: unknown field \"spec.foo\", unknown field \"bar\""
        );
    }
}
