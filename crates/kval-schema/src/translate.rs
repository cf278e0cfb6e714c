//! Structural schema → JSON Schema (draft 2020-12).
//!
//! OpenAPI-only notions are rewritten into plain JSON Schema: `nullable`
//! adds `"null"` to the type, `x-kubernetes-int-or-string` becomes
//! `["integer", "string"]`, and boolean `exclusiveMinimum` /
//! `exclusiveMaximum` become the numeric draft 2020-12 keywords.
//!
//! Unknown members are not constrained here (`additionalProperties: false`
//! is never emitted); the strict decoder reports them. Defaults and
//! `format` are dropped.

use serde_json::{json, Map, Value};

use crate::structural::{AdditionalProperties, Structural};

pub(crate) fn to_json_schema(s: &Structural) -> Value {
    let mut out = Map::new();

    if s.extensions.int_or_string {
        let mut types = vec![json!("integer"), json!("string")];
        if s.nullable {
            types.push(json!("null"));
        }
        out.insert("type".into(), Value::Array(types));
    } else if let Some(t) = &s.type_ {
        let t = if s.nullable {
            json!([t, "null"])
        } else {
            json!(t)
        };
        out.insert("type".into(), t);
    }

    if !s.properties.is_empty() {
        let properties: Map<String, Value> = s
            .properties
            .iter()
            .map(|(name, child)| (name.clone(), to_json_schema(child)))
            .collect();
        out.insert("properties".into(), Value::Object(properties));
    }
    if let Some(items) = &s.items {
        out.insert("items".into(), to_json_schema(items));
    }
    if let Some(AdditionalProperties::Schema(schema)) = &s.additional_properties {
        out.insert("additionalProperties".into(), to_json_schema(schema));
    }

    let v = &s.validation;
    if !v.required.is_empty() {
        out.insert("required".into(), json!(v.required));
    }
    if let Some(values) = &v.enum_values {
        out.insert("enum".into(), Value::Array(values.clone()));
    }
    if let Some(pattern) = &v.pattern {
        out.insert("pattern".into(), json!(pattern));
    }
    if let Some(min) = v.minimum {
        let key = if v.exclusive_minimum { "exclusiveMinimum" } else { "minimum" };
        out.insert(key.into(), number(min));
    }
    if let Some(max) = v.maximum {
        let key = if v.exclusive_maximum { "exclusiveMaximum" } else { "maximum" };
        out.insert(key.into(), number(max));
    }
    if let Some(m) = v.multiple_of {
        out.insert("multipleOf".into(), number(m));
    }
    let counts = [
        ("minLength", v.min_length),
        ("maxLength", v.max_length),
        ("minItems", v.min_items),
        ("maxItems", v.max_items),
        ("minProperties", v.min_properties),
        ("maxProperties", v.max_properties),
    ];
    for (key, limit) in counts {
        if let Some(limit) = limit {
            out.insert(key.into(), json!(limit));
        }
    }
    if v.unique_items {
        out.insert("uniqueItems".into(), Value::Bool(true));
    }
    for (key, branches) in [("allOf", &v.all_of), ("anyOf", &v.any_of), ("oneOf", &v.one_of)] {
        if !branches.is_empty() {
            out.insert(key.into(), branches.iter().map(junctor_branch).collect());
        }
    }
    if let Some(not) = &v.not {
        out.insert("not".into(), junctor_branch(not));
    }

    Value::Object(out)
}

/// Junctor branches are OpenAPI fragments; translate them the same way when
/// they convert, otherwise pass them through untouched.
fn junctor_branch(node: &Value) -> Value {
    match Structural::from_value(node) {
        Ok(branch) => to_json_schema(&branch),
        Err(_) => node.clone(),
    }
}

/// Integral limits stay integers so messages read `0`, not `0.0`.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(schema: Value) -> Value {
        to_json_schema(&Structural::from_value(&schema).unwrap())
    }

    #[test]
    fn nullable_and_int_or_string_types() {
        assert_eq!(
            translate(json!({ "type": "string", "nullable": true })),
            json!({ "type": ["string", "null"] })
        );
        assert_eq!(
            translate(json!({ "x-kubernetes-int-or-string": true })),
            json!({ "type": ["integer", "string"] })
        );
    }

    #[test]
    fn exclusive_bounds_become_numeric_keywords() {
        assert_eq!(
            translate(json!({ "type": "integer", "minimum": 0, "exclusiveMinimum": true, "maximum": 10 })),
            json!({ "type": "integer", "exclusiveMinimum": 0, "maximum": 10 })
        );
    }

    #[test]
    fn defaults_formats_and_closed_objects_are_not_emitted() {
        let out = translate(json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "at": { "type": "string", "format": "date-time", "default": "now" }
            }
        }));
        assert_eq!(
            out,
            json!({ "type": "object", "properties": { "at": { "type": "string" } } })
        );
    }

    #[test]
    fn junctor_branches_are_translated() {
        let out = translate(json!({
            "type": "object",
            "anyOf": [{ "required": ["a"] }, { "required": ["b"] }],
            "not": { "properties": { "c": { "type": "string", "nullable": true } } }
        }));
        assert_eq!(out["anyOf"], json!([{ "required": ["a"] }, { "required": ["b"] }]));
        assert_eq!(out["not"]["properties"]["c"]["type"], json!(["string", "null"]));
    }
}
