//! # Validator Factory
//!
//! Owns the resolution chain for a run and turns GVKs into [`Validators`]
//! bundles. Documents are resolved once per group-version and bundles are
//! built once per GVK; neither cache is invalidated, since schemas do not
//! change during a run.

use std::sync::Arc;

use kval_core::{GroupVersion, GroupVersionKind, OnceMap};
use kval_openapi::document::SCOPE_EXTENSION;
use kval_openapi::{SchemaDocument, SchemaSource, Scope};
use serde_json::Value;
use tracing::debug;

use crate::error::FactoryError;
use crate::structural::Structural;
use crate::validator::SchemaValidator;
use crate::validators::Validators;

#[derive(Debug)]
pub struct ValidatorFactory {
    source: Box<dyn SchemaSource>,
    documents: OnceMap<GroupVersion, Option<Arc<SchemaDocument>>>,
    validators: OnceMap<GroupVersionKind, Arc<Validators>>,
}

impl ValidatorFactory {
    /// Wrap `source` after checking its configuration.
    pub fn new(source: Box<dyn SchemaSource>) -> Result<Self, FactoryError> {
        source.check()?;
        Ok(Self {
            source,
            documents: OnceMap::new(),
            validators: OnceMap::new(),
        })
    }

    pub fn validators_for_gvk(&self, gvk: &GroupVersionKind) -> Result<Arc<Validators>, FactoryError> {
        self.validators.get_or_try_init(gvk, || self.build(gvk).map(Arc::new))
    }

    fn document(&self, gv: &GroupVersion) -> Result<Option<Arc<SchemaDocument>>, FactoryError> {
        self.documents.get_or_try_init(gv, || {
            debug!(source = self.source.name(), group_version = %gv, "resolving schema document");
            Ok(self.source.get(gv)?.map(Arc::new))
        })
    }

    fn build(&self, gvk: &GroupVersionKind) -> Result<Validators, FactoryError> {
        let document = self
            .document(&gvk.group_version())?
            .ok_or_else(|| FactoryError::not_found(gvk))?;
        let (name, node) = document
            .find_kind(gvk)
            .ok_or_else(|| FactoryError::not_found(gvk))?;
        debug!(%gvk, component = name, "building validators");

        let structural = Structural::from_openapi(&document, node)
            .map_err(|source| FactoryError::Schema {
                gvk: gvk.to_string(),
                source,
            })?
            .map(Arc::new);
        let namespaced = scope_of(&document, node, gvk) == Scope::Namespaced;

        let schema_validator = match &structural {
            Some(structural) => Some(SchemaValidator::new(Arc::clone(structural)).map_err(|reason| {
                FactoryError::Compile {
                    gvk: gvk.to_string(),
                    reason,
                }
            })?),
            None => {
                debug!(%gvk, "empty schema, objects of this kind are not validated");
                None
            }
        };

        Ok(Validators::new(gvk.clone(), structural, namespaced, schema_validator))
    }
}

/// Declared scope, else inferred from the REST paths, else namespaced.
fn scope_of(document: &SchemaDocument, node: &Value, gvk: &GroupVersionKind) -> Scope {
    node.get(SCOPE_EXTENSION)
        .and_then(Value::as_str)
        .and_then(Scope::parse)
        .or_else(|| document.path_scope(gvk))
        .unwrap_or(Scope::Namespaced)
}
