//! # Validator Bundles
//!
//! Everything needed to check objects of one GVK, built once per run by
//! [`crate::ValidatorFactory`] and shared read-only afterwards.

use std::sync::Arc;

use kval_core::{FieldError, GroupVersionKind, Path, TypeMeta};
use serde_json::Value;

use crate::decoder::Decoder;
use crate::structural::Structural;
use crate::validator::SchemaValidator;

/// Recognizes objects of the bundle's GVK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTyper {
    gvk: GroupVersionKind,
}

impl ObjectTyper {
    pub fn new(gvk: GroupVersionKind) -> Self {
        Self { gvk }
    }

    pub fn recognizes(&self, gvk: &GroupVersionKind) -> bool {
        &self.gvk == gvk
    }

    /// The GVK carried by `object`'s type metadata.
    pub fn object_kind(&self, object: &Value) -> Result<GroupVersionKind, FieldError> {
        let meta: TypeMeta = serde_json::from_value(object.clone())
            .map_err(|e| FieldError::internal(Path::root(), e.to_string()))?;
        let gvk = meta.group_version_kind();
        if gvk.kind.is_empty() {
            return Err(FieldError::required(Path::new("kind"), ""));
        }
        Ok(gvk)
    }
}

#[derive(Debug)]
pub struct Validators {
    gvk: GroupVersionKind,
    structural: Option<Arc<Structural>>,
    namespaced: bool,
    schema_validator: Option<SchemaValidator>,
}

impl Validators {
    pub(crate) fn new(
        gvk: GroupVersionKind,
        structural: Option<Arc<Structural>>,
        namespaced: bool,
        schema_validator: Option<SchemaValidator>,
    ) -> Self {
        Self {
            gvk,
            structural,
            namespaced,
            schema_validator,
        }
    }

    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    /// `None` when the kind's schema is empty: anything goes.
    pub fn structural(&self) -> Option<&Structural> {
        self.structural.as_deref()
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    /// A typer for `gvk`, which may differ from the bundle's own GVK once
    /// the legacy core group has been rewritten.
    pub fn object_typer(&self, gvk: &GroupVersionKind) -> ObjectTyper {
        ObjectTyper::new(gvk.clone())
    }

    pub fn schema_validator(&self) -> Option<&SchemaValidator> {
        self.schema_validator.as_ref()
    }

    /// A strict decoder targeting `gvk`'s own group-version.
    pub fn decoder<'a>(&'a self, gvk: &'a GroupVersionKind) -> Decoder<'a> {
        Decoder::new(gvk, self.structural())
    }
}
