//! # Manifest Validation
//!
//! [`ManifestValidator`] checks manifest files one document at a time:
//!
//! 1. read `apiVersion` / `kind` and reject documents without either;
//! 2. send `CustomResourceDefinition`s to the native model in [`crate::crd`];
//! 3. resolve the kind's [`kval_schema::Validators`] through the factory;
//! 4. decode strictly, normalize, and run the create admission checks.

use std::path::Path;

use kval_core::yaml::{is_empty_document, parse_yaml, split_documents};
use kval_core::TypeMeta;
use kval_schema::ValidatorFactory;
use tracing::debug;

use crate::admission::{before_create, CustomResourceStrategy};
use crate::crd;
use crate::error::{DocumentError, DocumentOutcome};
use crate::meta::{fill_object_meta_system_fields, ObjectMetaAccess, Unstructured};
use crate::normalize::normalize;

#[derive(Debug, Clone, Copy)]
pub struct ManifestValidator<'f> {
    factory: &'f ValidatorFactory,
}

impl<'f> ManifestValidator<'f> {
    pub fn new(factory: &'f ValidatorFactory) -> Self {
        Self { factory }
    }

    /// Validate every document of the file at `path`, in file order.
    ///
    /// `.yaml` / `.yml` files may hold several documents; anything else is
    /// a single document. Empty documents are [`DocumentOutcome::Skipped`].
    pub fn validate_file(&self, path: &Path) -> Vec<DocumentOutcome> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return vec![DocumentOutcome::Failed(DocumentError::Internal(format!(
                    "error reading file: {e}"
                )))]
            }
        };
        if !is_yaml(path) {
            return vec![self.validate_document(&bytes).into()];
        }

        let text = match std::str::from_utf8(&bytes) {
            Ok(text) => text,
            Err(e) => return vec![DocumentOutcome::Failed(DocumentError::Parse(e.to_string()))],
        };
        split_documents(text)
            .iter()
            .enumerate()
            .map(|(index, document)| {
                if is_empty_document(document) {
                    debug!(file = %path.display(), index, "skipping empty document");
                    DocumentOutcome::Skipped
                } else {
                    self.validate_document(document.as_bytes()).into()
                }
            })
            .collect()
    }

    /// Validate a single document.
    pub fn validate_document(&self, document: &[u8]) -> Result<(), DocumentError> {
        let text = std::str::from_utf8(document).map_err(|e| DocumentError::Parse(e.to_string()))?;
        let type_meta = read_type_meta(text)?;

        let gvk = type_meta.group_version_kind();
        if gvk.is_empty() {
            return Err(DocumentError::Identity);
        }

        if crd::is_crd(&gvk) {
            debug!(%gvk, "validating with the native definition model");
            return crd::validate_document(text);
        }

        let validators = self
            .factory
            .validators_for_gvk(&gvk)
            .map_err(DocumentError::Resolution)?;
        if validators.structural().is_none() {
            debug!(%gvk, "schema is empty, nothing to validate");
            return Ok(());
        }

        let decoded = validators.decoder(&gvk).decode(document)?;
        let mut obj = Unstructured::from_value(decoded)
            .map_err(|e| DocumentError::fields(vec![e].into()))?;

        let namespaced = validators.is_namespaced();
        let gvk = normalize(&mut obj, &gvk, namespaced);
        let strategy = CustomResourceStrategy::new(
            validators.object_typer(&gvk),
            namespaced,
            gvk,
            validators.schema_validator(),
        );

        fill_object_meta_system_fields(obj.metadata_mut());
        let namespace = obj.namespace().to_string();
        before_create(&strategy, &namespace, &mut obj)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

/// Only `apiVersion` and `kind`; everything else is ignored here.
fn read_type_meta(text: &str) -> Result<TypeMeta, DocumentError> {
    let value = parse_yaml(text).map_err(|e| DocumentError::Parse(e.to_string()))?;
    if value.is_null() {
        return Ok(TypeMeta::default());
    }
    serde_json::from_value::<TypeMeta>(value).map_err(|e| DocumentError::Parse(e.to_string()))
}
