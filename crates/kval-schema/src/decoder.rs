//! # Strict Decoding
//!
//! Turns one manifest document into a JSON tree bound to a GVK, the way the
//! API server's strict deserializer does:
//!
//! - YAML or JSON syntax errors and duplicate keys are rejected;
//! - `apiVersion` and `kind` must name the target GVK;
//! - every member the structural schema does not know is reported as
//!   `unknown field "spec.foo"`;
//! - structural defaults are filled into absent members.
//!
//! Type mismatches are left for schema validation, which reports them with
//! the offending path.

use kval_core::yaml::parse_yaml;
use kval_core::{GroupVersionKind, Path};
use serde_json::Value;

use crate::error::DecodeError;
use crate::structural::{AdditionalProperties, Structural};
use crate::validator::type_name;

/// Members every object with type metadata may carry, declared or not.
const TYPE_META_FIELDS: [&str; 2] = ["apiVersion", "kind"];

#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    gvk: &'a GroupVersionKind,
    structural: Option<&'a Structural>,
}

impl<'a> Decoder<'a> {
    pub fn new(gvk: &'a GroupVersionKind, structural: Option<&'a Structural>) -> Self {
        Self { gvk, structural }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::Syntax(e.to_string()))?;
        let value = parse_yaml(text).map_err(|e| DecodeError::Syntax(e.to_string()))?;
        self.decode_value(value)
    }

    /// Strict checks and defaulting on an already parsed tree.
    pub fn decode_value(&self, mut value: Value) -> Result<Value, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::NotAnObject {
                found: type_name(&value),
            });
        }

        let expected_version = self.gvk.group_version().api_version();
        let found_version = value.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
        if found_version != expected_version {
            return Err(DecodeError::VersionMismatch {
                expected: expected_version,
                found: found_version.to_string(),
            });
        }
        let found_kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
        if found_kind != self.gvk.kind {
            return Err(DecodeError::KindMismatch {
                expected: self.gvk.kind.clone(),
                found: found_kind.to_string(),
            });
        }

        let Some(schema) = self.structural else {
            return Ok(value);
        };
        let mut violations = Vec::new();
        unknown_fields(schema, &value, &Path::root(), true, &mut violations);
        if !violations.is_empty() {
            return Err(DecodeError::Strict { violations });
        }
        apply_defaults(schema, &mut value);
        Ok(value)
    }
}

fn unknown_fields(schema: &Structural, value: &Value, path: &Path, has_type_meta: bool, out: &mut Vec<String>) {
    match value {
        Value::Object(members) => {
            let type_meta = has_type_meta || schema.extensions.embedded_resource;
            let open = schema.allows_unknown_fields();
            for (name, member) in members {
                let child_path = path.child(name.clone());
                match schema.property(name) {
                    Some(child) => {
                        let nested = if schema.properties.contains_key(name) {
                            child_path
                        } else {
                            path.key(name.clone())
                        };
                        unknown_fields(child, member, &nested, false, out);
                    }
                    None if open => {}
                    None if type_meta && TYPE_META_FIELDS.contains(&name.as_str()) => {}
                    None => out.push(format!("unknown field {:?}", child_path.to_string())),
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = &schema.items {
                for (i, item) in items.iter().enumerate() {
                    unknown_fields(item_schema, item, &path.index(i), false, out);
                }
            }
        }
        _ => {}
    }
}

/// Empty strings and empty containers carry no information as defaults;
/// published documents attach them to nearly every field.
fn is_meaningful_default(default: &Value) -> bool {
    match default {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(members) => !members.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn apply_defaults(schema: &Structural, value: &mut Value) {
    match value {
        Value::Object(members) => {
            for (name, child) in &schema.properties {
                if !members.contains_key(name) {
                    if let Some(default) = child.default.as_ref().filter(|d| is_meaningful_default(d)) {
                        members.insert(name.clone(), default.clone());
                    }
                }
            }
            for (name, member) in members.iter_mut() {
                match schema.properties.get(name) {
                    Some(child) => apply_defaults(child, member),
                    None => {
                        if let Some(AdditionalProperties::Schema(child)) = &schema.additional_properties {
                            apply_defaults(child, member);
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = &schema.items {
                for item in items {
                    apply_defaults(item_schema, item);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn widget_schema() -> Structural {
        Structural::from_value(&json!({
            "type": "object",
            "properties": {
                "apiVersion": { "type": "string" },
                "kind": { "type": "string" },
                "metadata": { "type": "object", "properties": { "name": { "type": "string" } } },
                "spec": {
                    "type": "object",
                    "properties": {
                        "size": { "type": "integer", "default": 3 },
                        "mode": { "type": "string", "default": "" },
                        "labels": { "type": "object", "additionalProperties": { "type": "string" } },
                        "extra": { "type": "object", "x-kubernetes-preserve-unknown-fields": true },
                        "parts": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "weight": { "type": "integer", "default": 1 }
                                }
                            }
                        },
                        "template": {
                            "type": "object",
                            "x-kubernetes-embedded-resource": true,
                            "x-kubernetes-preserve-unknown-fields": false,
                            "properties": { "metadata": { "type": "object" } }
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new("acme.io", "v1", "Widget")
    }

    #[test]
    fn defaults_fill_absent_members() {
        let schema = widget_schema();
        let gvk = gvk();
        let decoded = Decoder::new(&gvk, Some(&schema))
            .decode(b"apiVersion: acme.io/v1\nkind: Widget\nspec:\n  parts:\n    - name: a\n    - name: b\n      weight: 5\n")
            .unwrap();
        assert_eq!(decoded["spec"]["size"], 3);
        assert!(decoded["spec"].get("mode").is_none());
        assert_eq!(decoded["spec"]["parts"][0]["weight"], 1);
        assert_eq!(decoded["spec"]["parts"][1]["weight"], 5);
    }

    #[test]
    fn unknown_fields_are_all_reported() {
        let schema = widget_schema();
        let gvk = gvk();
        let err = Decoder::new(&gvk, Some(&schema))
            .decode_value(json!({
                "apiVersion": "acme.io/v1",
                "kind": "Widget",
                "status": {},
                "spec": {
                    "colour": "red",
                    "labels": { "free": "form" },
                    "extra": { "anything": { "goes": true } },
                    "parts": [{ "name": "a", "mass": 2 }],
                    "template": { "apiVersion": "v1", "kind": "Pod", "spec": {} }
                }
            }))
            .unwrap_err();
        let DecodeError::Strict { mut violations } = err else {
            panic!("expected strict decoding error, got {err:?}");
        };
        violations.sort();
        assert_eq!(
            violations,
            vec![
                "unknown field \"spec.colour\"",
                "unknown field \"spec.parts[0].mass\"",
                "unknown field \"spec.template.spec\"",
                "unknown field \"status\"",
            ]
        );
    }

    #[test]
    fn type_metadata_must_match() {
        let gvk = gvk();
        let decoder = Decoder::new(&gvk, None);
        assert!(matches!(
            decoder.decode(b"apiVersion: acme.io/v2\nkind: Widget\n"),
            Err(DecodeError::VersionMismatch { .. })
        ));
        assert!(matches!(
            decoder.decode(b"apiVersion: acme.io/v1\nkind: Gadget\n"),
            Err(DecodeError::KindMismatch { .. })
        ));
    }

    #[test]
    fn syntax_errors_and_duplicate_keys() {
        let gvk = gvk();
        let decoder = Decoder::new(&gvk, None);
        assert!(matches!(decoder.decode(b"kind: [unclosed"), Err(DecodeError::Syntax(_))));
        assert!(matches!(
            decoder.decode(b"apiVersion: acme.io/v1\nkind: Widget\nkind: Widget\n"),
            Err(DecodeError::Syntax(_))
        ));
        assert!(matches!(
            decoder.decode(b"- a\n- b\n"),
            Err(DecodeError::NotAnObject { found: "array" })
        ));
    }

    #[test]
    fn without_schema_only_identity_is_checked() {
        let gvk = gvk();
        let decoded = Decoder::new(&gvk, None)
            .decode(b"{\"apiVersion\": \"acme.io/v1\", \"kind\": \"Widget\", \"anything\": 1}")
            .unwrap();
        assert_eq!(decoded["anything"], 1);
    }
}
