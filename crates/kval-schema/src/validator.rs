//! # Schema Validation
//!
//! [`SchemaValidator`] runs the three value checks the API server applies
//! to an object on create, in order:
//!
//! 1. the structural schema, compiled to JSON Schema and run with
//!    `jsonschema`;
//! 2. `x-kubernetes-validations` CEL rules;
//! 3. `x-kubernetes-list-type` uniqueness (`set` items, `map` key tuples).
//!
//! JSON Schema violations are mapped onto Kubernetes field errors by the
//! keyword that failed, so `spec.replicas: Invalid value: -1: should be
//! greater than or equal to 0` reads the way `kubectl apply` reports it.

use std::collections::BTreeSet;
use std::sync::Arc;

use jsonschema::Validator;
use kval_core::{ErrorList, FieldError, Path};
use serde_json::{Map, Value};

use crate::cel::RuleSet;
use crate::structural::{AdditionalProperties, ListType, Structural};
use crate::translate::to_json_schema;

pub struct SchemaValidator {
    structural: Arc<Structural>,
    schema: Value,
    compiled: Validator,
    rules: RuleSet,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .field("has_rules", &!self.rules.is_empty())
            .finish()
    }
}

impl SchemaValidator {
    /// Compile `structural` for validation. Fails only when the translated
    /// JSON Schema is rejected (e.g. an invalid `pattern`).
    pub fn new(structural: Arc<Structural>) -> Result<Self, String> {
        let schema = to_json_schema(&structural);
        let mut opts = jsonschema::options();
        opts.with_draft(jsonschema::Draft::Draft202012);
        let compiled = opts.build(&schema).map_err(|e| e.to_string())?;
        let rules = RuleSet::compile(&structural);
        Ok(Self {
            structural,
            schema,
            compiled,
            rules,
        })
    }

    pub fn structural(&self) -> &Structural {
        &self.structural
    }

    /// All three checks, in order.
    pub fn validate(&self, value: &Value) -> ErrorList {
        let mut errors = self.validate_schema(value);
        errors.extend(self.validate_rules(value));
        errors.extend(self.validate_lists(value));
        errors
    }

    pub fn validate_schema(&self, value: &Value) -> ErrorList {
        let mut errors = ErrorList::new();
        let mut reported_required = BTreeSet::new();
        for e in self.compiled.iter_errors(value) {
            let instance_pointer = e.instance_path.to_string();
            let schema_pointer = e.schema_path.to_string();
            let path = Path::from_json_pointer(&instance_pointer, value);
            let instance = value.pointer(&instance_pointer).unwrap_or(&Value::Null);
            let keyword = schema_pointer.rsplit('/').next().unwrap_or_default();
            let constraint = self.schema.pointer(&schema_pointer).unwrap_or(&Value::Null);

            if keyword == "required" {
                // One error per missing member, however the validator
                // chooses to report them.
                if !reported_required.insert((instance_pointer.clone(), schema_pointer.clone())) {
                    continue;
                }
                for name in missing_members(constraint, instance) {
                    errors.push(FieldError::required(path.child(name), ""));
                }
                continue;
            }
            errors.push(field_error(keyword, constraint, instance, path, &e.to_string()));
        }
        errors
    }

    pub fn validate_rules(&self, value: &Value) -> ErrorList {
        let mut errors = ErrorList::new();
        self.rules.evaluate(value, &Path::root(), &mut errors);
        errors
    }

    pub fn validate_lists(&self, value: &Value) -> ErrorList {
        let mut errors = ErrorList::new();
        check_lists(&self.structural, value, &Path::root(), &mut errors);
        errors
    }
}

fn missing_members(required: &Value, instance: &Value) -> Vec<String> {
    let Some(members) = instance.as_object() else {
        return Vec::new();
    };
    required
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .filter(|name| !members.contains_key(*name))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn field_error(keyword: &str, constraint: &Value, instance: &Value, path: Path, fallback: &str) -> FieldError {
    let limit = constraint.to_string();
    let count = constraint
        .as_u64()
        .map_or(0, |n| usize::try_from(n).unwrap_or(usize::MAX));
    match keyword {
        "type" => FieldError::type_invalid(
            path,
            type_name(instance),
            format!("must be of type {}", expected_types(constraint)),
        ),
        "enum" => {
            let options: Vec<String> = constraint
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_str().map_or_else(|| v.to_string(), String::from))
                        .collect()
                })
                .unwrap_or_default();
            FieldError::not_supported(path, instance.clone(), &options)
        }
        "minimum" => FieldError::invalid(path, instance.clone(), format!("should be greater than or equal to {limit}")),
        "exclusiveMinimum" => FieldError::invalid(path, instance.clone(), format!("should be greater than {limit}")),
        "maximum" => FieldError::invalid(path, instance.clone(), format!("should be less than or equal to {limit}")),
        "exclusiveMaximum" => FieldError::invalid(path, instance.clone(), format!("should be less than {limit}")),
        "multipleOf" => FieldError::invalid(path, instance.clone(), format!("should be a multiple of {limit}")),
        "pattern" => FieldError::invalid(
            path,
            instance.clone(),
            format!("should match '{}'", constraint.as_str().unwrap_or_default()),
        ),
        "minLength" => FieldError::invalid(path, instance.clone(), format!("should be at least {limit} chars long")),
        "maxLength" => FieldError::too_long(path, count),
        "minItems" => FieldError::invalid(path, type_name(instance), format!("should have at least {limit} items")),
        "maxItems" => FieldError::too_many(path, instance.as_array().map_or(0, Vec::len), count),
        "minProperties" => FieldError::invalid(path, type_name(instance), format!("should have at least {limit} properties")),
        "maxProperties" => FieldError::too_many(path, instance.as_object().map_or(0, Map::len), count),
        "uniqueItems" => match first_duplicate(instance) {
            Some((i, item)) => FieldError::duplicate(path.index(i), item.clone()),
            None => FieldError::invalid(path, type_name(instance), "shouldn't contain duplicates"),
        },
        _ => FieldError::invalid(path, type_name(instance), fallback.to_string()),
    }
}

fn expected_types(constraint: &Value) -> String {
    match constraint {
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .filter(|t| *t != "null")
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.as_str().unwrap_or_default().to_string(),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Index and value of the first item equal to an earlier one.
fn first_duplicate(value: &Value) -> Option<(usize, &Value)> {
    let items = value.as_array()?;
    items
        .iter()
        .enumerate()
        .find(|(i, item)| items[..*i].contains(item))
}

fn check_lists(schema: &Structural, value: &Value, path: &Path, errors: &mut ErrorList) {
    match value {
        Value::Array(items) => {
            match schema.extensions.list_type {
                Some(ListType::Set) => {
                    for (i, item) in items.iter().enumerate() {
                        if items[..i].contains(item) {
                            errors.push(FieldError::duplicate(path.index(i), item.clone()));
                        }
                    }
                }
                Some(ListType::Map) => {
                    let keys = &schema.extensions.list_map_keys;
                    let tuples: Vec<Value> = items.iter().map(|item| key_tuple(item, keys)).collect();
                    for (i, tuple) in tuples.iter().enumerate() {
                        if tuples[..i].contains(tuple) {
                            errors.push(FieldError::duplicate(path.index(i), tuple.clone()));
                        }
                    }
                }
                Some(ListType::Atomic) | None => {}
            }
            if let Some(item_schema) = &schema.items {
                for (i, item) in items.iter().enumerate() {
                    check_lists(item_schema, item, &path.index(i), errors);
                }
            }
        }
        Value::Object(members) => {
            for (name, member) in members {
                if let Some(child) = schema.properties.get(name) {
                    check_lists(child, member, &path.child(name.clone()), errors);
                } else if let Some(AdditionalProperties::Schema(child)) = &schema.additional_properties {
                    check_lists(child, member, &path.key(name.clone()), errors);
                }
            }
        }
        _ => {}
    }
}

/// The key fields of a `map` list item; absent keys are `null`.
fn key_tuple(item: &Value, keys: &[String]) -> Value {
    let tuple: Map<String, Value> = keys
        .iter()
        .map(|key| (key.clone(), item.get(key).cloned().unwrap_or(Value::Null)))
        .collect();
    Value::Object(tuple)
}

#[cfg(test)]
mod tests {
    use kval_core::ErrorType;
    use serde_json::json;

    use super::*;

    fn validator(schema: Value) -> SchemaValidator {
        SchemaValidator::new(Arc::new(Structural::from_value(&schema).unwrap())).unwrap()
    }

    fn rendered(errors: &ErrorList) -> Vec<String> {
        errors.iter().map(ToString::to_string).collect()
    }

    fn deployment_like() -> SchemaValidator {
        validator(json!({
            "type": "object",
            "required": ["spec"],
            "properties": {
                "spec": {
                    "type": "object",
                    "required": ["selector", "template"],
                    "properties": {
                        "replicas": { "type": "integer", "minimum": 0 },
                        "strategy": { "type": "string", "enum": ["Recreate", "RollingUpdate"] },
                        "selector": { "type": "object" },
                        "template": { "type": "object" },
                        "containers": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": { "name": { "type": "string", "maxLength": 5 } }
                            }
                        }
                    }
                }
            }
        }))
    }

    #[test]
    fn valid_object_passes() {
        let errors = deployment_like().validate(&json!({
            "spec": { "replicas": 2, "selector": {}, "template": {} }
        }));
        assert!(errors.is_empty(), "{:?}", rendered(&errors));
    }

    #[test]
    fn violations_map_to_kubernetes_field_errors() {
        let errors = deployment_like().validate_schema(&json!({
            "spec": {
                "replicas": -1,
                "strategy": "Blue",
                "selector": {},
                "containers": [{ "name": "too-long-name" }]
            }
        }));
        let mut lines = rendered(&errors);
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "spec.containers[0].name: Too long: must have at most 5 bytes",
                "spec.replicas: Invalid value: -1: should be greater than or equal to 0",
                "spec.strategy: Unsupported value: \"Blue\": supported values: \"Recreate\", \"RollingUpdate\"",
                "spec.template: Required value",
            ]
        );
    }

    #[test]
    fn type_mismatch_names_expected_type() {
        let errors = deployment_like().validate_schema(&json!({
            "spec": { "replicas": "two", "selector": {}, "template": {} }
        }));
        assert_eq!(errors.len(), 1);
        let error = &errors.errors()[0];
        assert_eq!(error.error_type, ErrorType::TypeInvalid);
        assert_eq!(
            error.to_string(),
            "spec.replicas: Invalid value: \"string\": must be of type integer"
        );
    }

    #[test]
    fn nullable_and_int_or_string_values_are_accepted() {
        let v = validator(json!({
            "type": "object",
            "properties": {
                "port": { "x-kubernetes-int-or-string": true },
                "note": { "type": "string", "nullable": true }
            }
        }));
        assert!(v.validate(&json!({ "port": 80, "note": null })).is_empty());
        assert!(v.validate(&json!({ "port": "http" })).is_empty());
        assert_eq!(v.validate(&json!({ "port": true })).len(), 1);
    }

    #[test]
    fn set_and_map_lists_reject_duplicates() {
        let v = validator(json!({
            "type": "object",
            "properties": {
                "finalizers": { "type": "array", "items": { "type": "string" }, "x-kubernetes-list-type": "set" },
                "ports": {
                    "type": "array",
                    "x-kubernetes-list-type": "map",
                    "x-kubernetes-list-map-keys": ["port", "protocol"],
                    "items": {
                        "type": "object",
                        "properties": { "port": { "type": "integer" }, "protocol": { "type": "string" } }
                    }
                }
            }
        }));
        let errors = v.validate_lists(&json!({
            "finalizers": ["a", "b", "a"],
            "ports": [
                { "port": 80, "protocol": "TCP" },
                { "port": 80, "protocol": "UDP" },
                { "port": 80, "protocol": "TCP" }
            ]
        }));
        assert_eq!(
            rendered(&errors),
            vec![
                "finalizers[2]: Duplicate value: \"a\"",
                "ports[2]: Duplicate value: \"object\"",
            ]
        );
    }

    #[test]
    fn invalid_pattern_fails_compilation() {
        let structural = Structural::from_value(&json!({ "type": "string", "pattern": "([" })).unwrap();
        assert!(SchemaValidator::new(Arc::new(structural)).is_err());
    }

    #[test]
    fn size_limits_keep_their_value() {
        let items = field_error("maxItems", &json!(3), &json!([1, 2, 3, 4]), Path::new("list"), "");
        assert_eq!(items.to_string(), "list: Too many: 4: must have at most 3 items");

        let huge = field_error("maxLength", &json!(u64::MAX), &json!("x"), Path::new("name"), "");
        assert_eq!(huge.body(), format!("Too long: must have at most {} bytes", usize::MAX));
    }
}
