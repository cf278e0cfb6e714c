//! # Create Admission
//!
//! Runs an object through the checks the API server applies before
//! persisting a new object. [`before_create`] is the generic driver; a
//! [`RestCreateStrategy`] supplies the kind-specific parts.

use kval_core::{ErrorList, FieldError, GroupVersionKind, Path};
use kval_schema::{ObjectTyper, SchemaValidator};

use crate::error::DocumentError;
use crate::meta::{
    generate_name, name_is_dns_subdomain, name_is_path_segment, validate_object_meta,
    ObjectMetaAccess, Unstructured,
};

/// Kind-specific behavior for [`before_create`].
pub trait RestCreateStrategy {
    type Object: ObjectMetaAccess;

    fn namespace_scoped(&self) -> bool;

    /// The registered kind of `obj`.
    fn object_kind(&self, obj: &Self::Object) -> Result<GroupVersionKind, DocumentError>;

    /// Normalize the object before validation.
    fn prepare_for_create(&self, _obj: &mut Self::Object) {}

    fn validate(&self, obj: &Self::Object) -> ErrorList;
}

/// Prepare and validate `obj` as if it were about to be created in
/// `request_namespace`.
///
/// Kind-specific errors are returned before the common `ObjectMeta` checks
/// run, so the more specific messages win.
pub fn before_create<S: RestCreateStrategy>(
    strategy: &S,
    request_namespace: &str,
    obj: &mut S::Object,
) -> Result<(), DocumentError> {
    let gvk = strategy.object_kind(obj)?;

    if strategy.namespace_scoped() {
        if obj.namespace().is_empty() {
            obj.set_namespace(request_namespace);
        }
        if obj.namespace() != request_namespace {
            return Err(DocumentError::Internal(
                "the namespace of the provided object does not match the namespace sent on the request"
                    .into(),
            ));
        }
    } else if !obj.namespace().is_empty() {
        obj.set_namespace("");
    }

    let meta = obj.metadata_mut();
    meta.remove("deletionTimestamp");
    meta.remove("deletionGracePeriodSeconds");

    strategy.prepare_for_create(obj);

    if obj.name().is_empty() {
        let base = obj
            .metadata()
            .get("generateName")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if !base.is_empty() {
            obj.metadata_mut()
                .insert("name".into(), generate_name(&base).into());
        }
    }

    let invalid = |obj: &S::Object, errors: ErrorList| DocumentError::Invalid {
        group: gvk.group.clone(),
        kind: gvk.kind.clone(),
        name: obj.name().to_string(),
        errors,
    };

    let errors = strategy.validate(obj);
    if !errors.is_empty() {
        return Err(invalid(obj, errors));
    }

    let errors = validate_object_meta(
        obj.metadata(),
        strategy.namespace_scoped(),
        &name_is_path_segment,
        &Path::new("metadata"),
    );
    if !errors.is_empty() {
        return Err(invalid(obj, errors));
    }
    Ok(())
}

/// Create checks for objects validated purely through their schema.
#[derive(Debug)]
pub struct CustomResourceStrategy<'a> {
    typer: ObjectTyper,
    namespaced: bool,
    gvk: GroupVersionKind,
    schema_validator: Option<&'a SchemaValidator>,
}

impl<'a> CustomResourceStrategy<'a> {
    pub fn new(
        typer: ObjectTyper,
        namespaced: bool,
        gvk: GroupVersionKind,
        schema_validator: Option<&'a SchemaValidator>,
    ) -> Self {
        Self {
            typer,
            namespaced,
            gvk,
            schema_validator,
        }
    }

    fn validate_type_meta(&self, obj: &Unstructured) -> ErrorList {
        let mut errors = ErrorList::new();
        let kind = obj.kind();
        let api_version = obj.api_version();
        let expected_api_version = format!("{}/{}", self.gvk.group, self.gvk.version);

        if kind.is_empty() {
            errors.push(FieldError::required(Path::new("kind"), ""));
        } else if kind != self.gvk.kind {
            errors.push(FieldError::invalid(
                Path::new("kind"),
                kind,
                format!("must be {}", self.gvk.kind),
            ));
        }
        if api_version.is_empty() {
            errors.push(FieldError::required(Path::new("apiVersion"), ""));
        } else if api_version != expected_api_version {
            errors.push(FieldError::invalid(
                Path::new("apiVersion"),
                api_version,
                format!("must be {expected_api_version}"),
            ));
        }
        errors
    }
}

impl RestCreateStrategy for CustomResourceStrategy<'_> {
    type Object = Unstructured;

    fn namespace_scoped(&self) -> bool {
        self.namespaced
    }

    fn object_kind(&self, obj: &Unstructured) -> Result<GroupVersionKind, DocumentError> {
        let gvk = self
            .typer
            .object_kind(&obj.to_value())
            .map_err(|e| DocumentError::fields(vec![e].into()))?;
        if !self.typer.recognizes(&gvk) {
            return Err(DocumentError::Internal(format!(
                "no kind {gvk} is registered for this object"
            )));
        }
        Ok(gvk)
    }

    fn prepare_for_create(&self, obj: &mut Unstructured) {
        obj.metadata_mut().insert("generation".into(), 1.into());
    }

    fn validate(&self, obj: &Unstructured) -> ErrorList {
        let errors = self.validate_type_meta(obj);
        if !errors.is_empty() {
            return errors;
        }

        let mut errors = ErrorList::new();
        if let Some(validator) = self.schema_validator {
            errors.extend(validator.validate(&obj.to_value()));
        }
        errors.extend(validate_object_meta(
            obj.metadata(),
            self.namespaced,
            &name_is_dns_subdomain,
            &Path::new("metadata"),
        ));
        errors
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn widget(value: serde_json::Value) -> Unstructured {
        Unstructured::from_value(value).unwrap()
    }

    fn strategy(namespaced: bool) -> CustomResourceStrategy<'static> {
        let gvk = GroupVersionKind::new("acme.io", "v1", "Widget");
        CustomResourceStrategy::new(ObjectTyper::new(gvk.clone()), namespaced, gvk, None)
    }

    fn messages(err: DocumentError) -> Vec<String> {
        match err {
            DocumentError::Invalid { errors, .. } => errors.iter().map(ToString::to_string).collect(),
            other => panic!("expected field errors, got {other}"),
        }
    }

    #[test]
    fn valid_object_passes_and_is_prepared() {
        let mut obj = widget(json!({
            "apiVersion": "acme.io/v1",
            "kind": "Widget",
            "metadata": { "name": "w", "namespace": "ns", "deletionTimestamp": "2024-01-01T00:00:00Z" }
        }));
        before_create(&strategy(true), "ns", &mut obj).unwrap();
        assert!(obj.metadata().get("deletionTimestamp").is_none());
        assert_eq!(obj.metadata()["generation"], 1);
    }

    #[test]
    fn namespace_must_match_request() {
        let mut obj = widget(json!({
            "apiVersion": "acme.io/v1",
            "kind": "Widget",
            "metadata": { "name": "w", "namespace": "a" }
        }));
        let err = before_create(&strategy(true), "b", &mut obj).unwrap_err();
        assert!(matches!(err, DocumentError::Internal(_)));
    }

    #[test]
    fn cluster_scoped_namespace_is_cleared() {
        let mut obj = widget(json!({
            "apiVersion": "acme.io/v1",
            "kind": "Widget",
            "metadata": { "name": "w", "namespace": "a" }
        }));
        before_create(&strategy(false), "", &mut obj).unwrap();
        assert_eq!(obj.namespace(), "");
    }

    #[test]
    fn unregistered_kind_is_rejected() {
        let mut obj = widget(json!({ "apiVersion": "acme.io/v2", "kind": "Widget", "metadata": { "name": "w" } }));
        let err = before_create(&strategy(false), "", &mut obj).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no kind acme.io/v2, Kind=Widget is registered for this object"
        );
    }

    #[test]
    fn legacy_core_api_version_fails_type_meta() {
        let gvk = GroupVersionKind::new("", "v1", "ConfigMap");
        let strategy = CustomResourceStrategy::new(ObjectTyper::new(gvk.clone()), true, gvk, None);
        let mut obj = widget(json!({ "apiVersion": "v1", "kind": "ConfigMap", "metadata": { "name": "c" } }));
        let errors = messages(before_create(&strategy, "default", &mut obj).unwrap_err());
        assert_eq!(errors, vec!["apiVersion: Invalid value: \"v1\": must be /v1"]);
    }

    #[test]
    fn generate_name_fills_name() {
        let mut obj = widget(json!({
            "apiVersion": "acme.io/v1",
            "kind": "Widget",
            "metadata": { "generateName": "w-" }
        }));
        before_create(&strategy(false), "", &mut obj).unwrap();
        assert!(obj.name().starts_with("w-"));
    }

    #[test]
    fn metadata_errors_name_the_object() {
        let mut obj = widget(json!({
            "apiVersion": "acme.io/v1",
            "kind": "Widget",
            "metadata": { "name": "Bad_Name" }
        }));
        let err = before_create(&strategy(false), "", &mut obj).unwrap_err();
        assert!(err.to_string().starts_with("Widget.acme.io \"Bad_Name\" is invalid: metadata.name: Invalid value"));
    }
}
