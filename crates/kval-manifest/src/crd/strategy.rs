//! Create checks for `CustomResourceDefinition` objects.

use kval_core::naming::{is_dns1035_label, is_dns1123_label, is_dns1123_subdomain};
use kval_core::{ErrorList, FieldError, GroupVersionKind, Path};
use kval_schema::Structural;
use serde_json::Value;

use super::types::{
    CustomResourceDefinition, CustomResourceDefinitionNames, CustomResourceDefinitionSpec,
    CONVERSION_NONE, CONVERSION_WEBHOOK, CRD_GROUP, CRD_KIND, SCOPE_CLUSTER, SCOPE_NAMESPACED,
    SERVED_VERSIONS,
};
use crate::admission::RestCreateStrategy;
use crate::error::DocumentError;
use crate::meta::{name_is_dns_subdomain, validate_object_meta, ObjectMetaAccess};

#[derive(Debug, Default, Clone, Copy)]
pub struct CrdStrategy;

impl RestCreateStrategy for CrdStrategy {
    type Object = CustomResourceDefinition;

    fn namespace_scoped(&self) -> bool {
        false
    }

    fn object_kind(&self, obj: &CustomResourceDefinition) -> Result<GroupVersionKind, DocumentError> {
        let gvk = GroupVersionKind::from_api_version_and_kind(&obj.api_version, &obj.kind);
        if gvk.group != CRD_GROUP || gvk.kind != CRD_KIND || !SERVED_VERSIONS.contains(&gvk.version.as_str()) {
            return Err(DocumentError::Internal(format!(
                "no kind {gvk} is registered for this object"
            )));
        }
        Ok(gvk)
    }

    fn prepare_for_create(&self, obj: &mut CustomResourceDefinition) {
        obj.status = None;
        obj.metadata_mut().insert("generation".into(), 1.into());
    }

    fn validate(&self, obj: &CustomResourceDefinition) -> ErrorList {
        validate_custom_resource_definition(obj)
    }
}

pub fn validate_custom_resource_definition(obj: &CustomResourceDefinition) -> ErrorList {
    let required_name = format!("{}.{}", obj.spec.names.plural, obj.spec.group);
    let name_rule = |name: &str, prefix: bool| {
        let mut msgs = name_is_dns_subdomain(name, prefix);
        if name != required_name {
            msgs.push("must be spec.names.plural+\".\"+spec.group".to_string());
        }
        msgs
    };

    let mut errors = validate_object_meta(obj.metadata(), false, &name_rule, &Path::new("metadata"));
    errors.extend(validate_spec(&obj.spec, obj.served_version() == "v1", &Path::new("spec")));
    errors
}

fn validate_spec(spec: &CustomResourceDefinitionSpec, v1: bool, path: &Path) -> ErrorList {
    let mut errors = ErrorList::new();

    if spec.group.is_empty() {
        errors.push(FieldError::required(path.child("group"), ""));
    } else {
        let msgs = is_dns1123_subdomain(&spec.group);
        if !msgs.is_empty() {
            errors.push(FieldError::invalid(path.child("group"), spec.group.as_str(), msgs.join(",")));
        }
        if !spec.group.contains('.') {
            errors.push(FieldError::invalid(
                path.child("group"),
                spec.group.as_str(),
                "should be a domain with at least one dot",
            ));
        }
    }

    match spec.scope.as_str() {
        "" => errors.push(FieldError::required(path.child("scope"), "")),
        SCOPE_CLUSTER | SCOPE_NAMESPACED => {}
        other => errors.push(FieldError::not_supported(
            path.child("scope"),
            other,
            &[SCOPE_CLUSTER, SCOPE_NAMESPACED],
        )),
    }

    errors.extend(validate_names(&spec.names, &path.child("names")));
    errors.extend(validate_versions(spec, &path.child("versions")));

    if let Some(conversion) = &spec.conversion {
        let strategy_path = path.child("conversion").child("strategy");
        match conversion.strategy.as_str() {
            CONVERSION_NONE => {}
            CONVERSION_WEBHOOK => {
                if conversion.webhook.is_none() {
                    errors.push(FieldError::required(
                        path.child("conversion").child("webhook"),
                        "required when strategy is set to Webhook",
                    ));
                }
            }
            other => errors.push(FieldError::not_supported(
                strategy_path,
                other,
                &[CONVERSION_NONE, CONVERSION_WEBHOOK],
            )),
        }
    }

    if v1 && spec.preserve_unknown_fields == Some(true) {
        errors.push(FieldError::invalid(
            path.child("preserveUnknownFields"),
            true,
            "cannot set to true, set x-kubernetes-preserve-unknown-fields to true in spec.versions[*].schema instead",
        ));
    }
    errors
}

fn validate_names(names: &CustomResourceDefinitionNames, path: &Path) -> ErrorList {
    let mut errors = ErrorList::new();

    for (field, value) in [("plural", &names.plural), ("singular", &names.singular)] {
        if value.is_empty() {
            errors.push(FieldError::required(path.child(field), ""));
            continue;
        }
        let msgs = is_dns1123_label(value);
        if !msgs.is_empty() {
            errors.push(FieldError::invalid(path.child(field), value.as_str(), msgs.join(",")));
        }
    }

    for (field, value) in [("kind", &names.kind), ("listKind", &names.list_kind)] {
        if value.is_empty() {
            errors.push(FieldError::required(path.child(field), ""));
            continue;
        }
        let msgs = is_dns1035_label(&value.to_lowercase());
        if !msgs.is_empty() {
            errors.push(FieldError::invalid(
                path.child(field),
                value.as_str(),
                format!("may have mixed case, but should otherwise match: {}", msgs.join(",")),
            ));
        }
    }
    if !names.kind.is_empty() && names.kind == names.list_kind {
        errors.push(FieldError::invalid(
            path.child("listKind"),
            names.list_kind.as_str(),
            "kind and listKind may not be the same",
        ));
    }

    for (i, short_name) in names.short_names.iter().enumerate() {
        let msgs = is_dns1123_label(short_name);
        if !msgs.is_empty() {
            errors.push(FieldError::invalid(
                path.child("shortNames").index(i),
                short_name.as_str(),
                msgs.join(","),
            ));
        }
    }
    for (i, category) in names.categories.iter().enumerate() {
        let msgs = is_dns1123_label(category);
        if !msgs.is_empty() {
            errors.push(FieldError::invalid(
                path.child("categories").index(i),
                category.as_str(),
                msgs.join(","),
            ));
        }
    }
    errors
}

fn validate_versions(spec: &CustomResourceDefinitionSpec, path: &Path) -> ErrorList {
    let mut errors = ErrorList::new();
    let versions = &spec.versions;
    if versions.is_empty() {
        errors.push(FieldError::required(path.clone(), "must have at least one version"));
        return errors;
    }

    let names: Vec<Value> = versions.iter().map(|v| Value::from(v.name.as_str())).collect();
    let mut seen = std::collections::BTreeSet::new();
    let mut unique = true;
    for (i, version) in versions.iter().enumerate() {
        let version_path = path.index(i);
        if !seen.insert(version.name.as_str()) {
            unique = false;
        }
        let msgs = is_dns1035_label(&version.name);
        if !msgs.is_empty() {
            errors.push(FieldError::invalid(
                version_path.child("name"),
                version.name.as_str(),
                msgs.join(","),
            ));
        }
        if let Some(schema) = version.schema.as_ref().and_then(|s| s.open_api_v3_schema.as_ref()) {
            errors.extend(validate_schema(
                schema,
                &version_path.child("schema").child("openAPIV3Schema"),
            ));
        }
    }

    if !unique {
        errors.push(FieldError::invalid(path.clone(), names.clone(), "must contain unique version names"));
    }
    if versions.iter().filter(|v| v.storage).count() != 1 {
        errors.push(FieldError::invalid(
            path.clone(),
            names.clone(),
            "must have exactly one version marked as storage version",
        ));
    }
    if !versions.iter().any(|v| v.served) {
        errors.push(FieldError::invalid(
            path.clone(),
            names,
            "must have at least one version marked as served",
        ));
    }
    errors
}

/// Root must be an object and the whole tree structural.
fn validate_schema(schema: &Value, path: &Path) -> ErrorList {
    let mut errors = ErrorList::new();
    let root_type = schema.get("type").and_then(Value::as_str).unwrap_or_default();
    if root_type != "object" {
        errors.push(FieldError::invalid(path.child("type"), root_type, "must be object at the root"));
    }
    match Structural::from_value(schema) {
        Ok(structural) => errors.extend(structural.structural_violations(path)),
        Err(e) => errors.push(FieldError::invalid(path.clone(), Value::Null, e.to_string())),
    }
    errors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn crd(spec: Value) -> CustomResourceDefinition {
        let mut c: CustomResourceDefinition = serde_json::from_value(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": "widgets.acme.io" },
            "spec": spec
        }))
        .unwrap();
        c.apply_defaults();
        c
    }

    fn messages(c: &CustomResourceDefinition) -> Vec<String> {
        validate_custom_resource_definition(c)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn widget_spec() -> Value {
        json!({
            "group": "acme.io",
            "scope": "Namespaced",
            "names": { "plural": "widgets", "kind": "Widget" },
            "versions": [{
                "name": "v1",
                "served": true,
                "storage": true,
                "schema": { "openAPIV3Schema": {
                    "type": "object",
                    "properties": { "spec": { "type": "object", "properties": { "size": { "type": "integer" } } } }
                } }
            }]
        })
    }

    #[test]
    fn well_formed_definition_passes() {
        assert!(messages(&crd(widget_spec())).is_empty());
    }

    #[test]
    fn name_must_match_plural_and_group() {
        let mut c = crd(widget_spec());
        c.metadata.insert("name".into(), "gadgets.acme.io".into());
        assert_eq!(
            messages(&c),
            vec!["metadata.name: Invalid value: \"gadgets.acme.io\": must be spec.names.plural+\".\"+spec.group"]
        );
    }

    #[test]
    fn group_scope_and_names() {
        let mut spec = widget_spec();
        spec["group"] = json!("acme");
        spec["scope"] = json!("Global");
        spec["names"]["listKind"] = json!("Widget");
        let mut c = crd(spec);
        c.metadata.insert("name".into(), "widgets.acme".into());
        let errors = messages(&c);
        assert_eq!(
            errors,
            vec![
                "spec.group: Invalid value: \"acme\": should be a domain with at least one dot",
                "spec.scope: Unsupported value: \"Global\": supported values: \"Cluster\", \"Namespaced\"",
                "spec.names.listKind: Invalid value: \"Widget\": kind and listKind may not be the same",
            ]
        );
    }

    #[test]
    fn versions_need_one_storage_and_unique_names() {
        let mut spec = widget_spec();
        spec["versions"] = json!([
            { "name": "v1", "served": false, "storage": false },
            { "name": "v1", "served": false, "storage": false }
        ]);
        let errors = messages(&crd(spec));
        assert_eq!(
            errors,
            vec![
                "spec.versions: Invalid value: \"array\": must contain unique version names",
                "spec.versions: Invalid value: \"array\": must have exactly one version marked as storage version",
                "spec.versions: Invalid value: \"array\": must have at least one version marked as served",
            ]
        );
    }

    #[test]
    fn schemas_must_be_structural() {
        let mut spec = widget_spec();
        spec["versions"][0]["schema"]["openAPIV3Schema"] = json!({
            "type": "object",
            "properties": { "spec": { "description": "untyped" } }
        });
        assert_eq!(
            messages(&crd(spec)),
            vec!["spec.versions[0].schema.openAPIV3Schema.properties[spec].type: Required value: must not be empty for specified object fields"]
        );
    }

    #[test]
    fn preserve_unknown_fields_is_forbidden_in_v1() {
        let mut spec = widget_spec();
        spec["preserveUnknownFields"] = json!(true);
        let errors = messages(&crd(spec));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("spec.preserveUnknownFields: Invalid value: true: cannot set to true"));
    }

    #[test]
    fn webhook_conversion_needs_config() {
        let mut spec = widget_spec();
        spec["conversion"] = json!({ "strategy": "Webhook" });
        assert_eq!(
            messages(&crd(spec)),
            vec!["spec.conversion.webhook: Required value: required when strategy is set to Webhook"]
        );
    }

    #[test]
    fn strategy_rejects_unserved_versions() {
        let mut c = crd(widget_spec());
        c.api_version = "apiextensions.k8s.io/v2".into();
        assert!(matches!(CrdStrategy.object_kind(&c), Err(DocumentError::Internal(_))));
    }
}
