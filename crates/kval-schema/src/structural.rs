//! # Structural Schemas
//!
//! A structural schema is the restricted, cycle-free form of an OpenAPI v3
//! schema that the API server validates, prunes and defaults against:
//!
//! - every node has its own `type`, `properties`, `items` and
//!   `additionalProperties` (no `$ref`, no structure hidden in `allOf`);
//! - logical junctors (`allOf`, `anyOf`, `oneOf`, `not`) carry value
//!   validations only;
//! - Kubernetes extensions (`x-kubernetes-*`) are first-class fields.
//!
//! Conversion inlines `$ref`s, including the `allOf: [{$ref: ...}]` wrapper
//! the published documents use to attach a default or description to a
//! referenced type. Recursive references cannot be inlined and are
//! rejected.

use std::collections::{BTreeMap, HashMap};

use kval_core::{ErrorList, FieldError, Path};
use kval_openapi::document::{GVK_EXTENSION, SCOPE_EXTENSION};
use kval_openapi::SchemaDocument;
use serde_json::{Map, Value};
use thiserror::Error;

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Keys that describe a node without constraining it.
const ANNOTATION_KEYS: [&str; 3] = ["description", GVK_EXTENSION, SCOPE_EXTENSION];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("recursive schema reference to {name} cannot be converted to a structural schema")]
    Recursive { name: String },

    #[error("unresolved schema reference {reference:?}")]
    UnresolvedRef { reference: String },

    #[error("{location}: {reason}")]
    Unsupported { location: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListType {
    Atomic,
    Set,
    Map,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<Structural>),
}

/// One `x-kubernetes-validations` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationRule {
    pub rule: String,
    pub message: Option<String>,
    pub message_expression: Option<String>,
    pub field_path: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extensions {
    pub preserve_unknown_fields: bool,
    pub int_or_string: bool,
    pub embedded_resource: bool,
    pub list_type: Option<ListType>,
    pub list_map_keys: Vec<String>,
    pub validations: Vec<ValidationRule>,
}

/// Value constraints that do not affect the shape of the data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueValidation {
    pub required: Vec<String>,
    pub enum_values: Option<Vec<Value>>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub multiple_of: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub all_of: Vec<Value>,
    pub any_of: Vec<Value>,
    pub one_of: Vec<Value>,
    pub not: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structural {
    pub type_: Option<String>,
    pub format: Option<String>,
    pub nullable: bool,
    pub properties: BTreeMap<String, Structural>,
    pub items: Option<Box<Structural>>,
    pub additional_properties: Option<AdditionalProperties>,
    pub default: Option<Value>,
    pub validation: ValueValidation,
    pub extensions: Extensions,
}

impl Structural {
    /// Convert an OpenAPI node from `doc` into a structural schema.
    ///
    /// Returns `Ok(None)` for an empty schema: `{}`, or a node carrying only
    /// its description and kind metadata.
    pub fn from_openapi(doc: &SchemaDocument, node: &Value) -> Result<Option<Self>, StructuralError> {
        let unconstrained = node
            .as_object()
            .is_some_and(|obj| obj.keys().all(|key| ANNOTATION_KEYS.contains(&key.as_str())));
        if unconstrained {
            return Ok(None);
        }
        Converter::new(Some(doc)).convert(node, "").map(Some)
    }

    /// Convert a self-contained schema (no `$ref`s), such as a CRD's
    /// `openAPIV3Schema`.
    pub fn from_value(node: &Value) -> Result<Self, StructuralError> {
        Converter::new(None).convert(node, "")
    }

    pub fn is_object(&self) -> bool {
        self.type_.as_deref() == Some("object")
    }

    pub fn is_array(&self) -> bool {
        self.type_.as_deref() == Some("array")
    }

    /// Child schema for an object member, whether declared or via
    /// `additionalProperties`.
    pub fn property(&self, name: &str) -> Option<&Structural> {
        self.properties.get(name).or(match &self.additional_properties {
            Some(AdditionalProperties::Schema(schema)) => Some(schema),
            _ => None,
        })
    }

    /// Whether members not listed in `properties` are part of the schema.
    ///
    /// Objects with neither `properties` nor `additionalProperties` are
    /// treated as open.
    pub fn allows_unknown_fields(&self) -> bool {
        self.extensions.preserve_unknown_fields
            || self.extensions.int_or_string
            || matches!(
                self.additional_properties,
                Some(AdditionalProperties::Schema(_)) | Some(AdditionalProperties::Allowed(true))
            )
            || (self.properties.is_empty() && self.additional_properties.is_none())
    }

    /// Violations of the structural-schema rules for CRD schemas.
    ///
    /// `path` is where this node lives in the CRD (e.g.
    /// `spec.versions[0].schema.openAPIV3Schema`).
    pub fn structural_violations(&self, path: &Path) -> ErrorList {
        let mut errors = ErrorList::new();
        self.collect_violations(path, true, &mut errors);
        errors
    }

    fn collect_violations(&self, path: &Path, is_root: bool, errors: &mut ErrorList) {
        let typeless_ok = self.extensions.int_or_string || self.extensions.preserve_unknown_fields;
        if self.type_.is_none() && !typeless_ok && !is_root {
            errors.push(FieldError::required(
                path.child("type"),
                "must not be empty for specified object fields",
            ));
        }
        if self.is_array() && self.items.is_none() {
            errors.push(FieldError::required(
                path.child("items"),
                "must be specified",
            ));
        }
        if !self.properties.is_empty()
            && matches!(self.additional_properties, Some(AdditionalProperties::Schema(_)))
        {
            errors.push(FieldError::forbidden(
                path.child("additionalProperties"),
                "additionalProperties and properties are mutual exclusive",
            ));
        }
        if self.extensions.list_type == Some(ListType::Map) && self.extensions.list_map_keys.is_empty() {
            errors.push(FieldError::required(
                path.child("x-kubernetes-list-map-keys"),
                "must not be empty if x-kubernetes-list-type is map",
            ));
        }
        for (name, child) in &self.properties {
            child.collect_violations(&path.child("properties").key(name.clone()), false, errors);
        }
        if let Some(items) = &self.items {
            items.collect_violations(&path.child("items"), false, errors);
        }
        if let Some(AdditionalProperties::Schema(schema)) = &self.additional_properties {
            schema.collect_violations(&path.child("additionalProperties"), false, errors);
        }
    }
}

struct Converter<'a> {
    doc: Option<&'a SchemaDocument>,
    stack: Vec<String>,
    memo: HashMap<String, Structural>,
}

impl<'a> Converter<'a> {
    fn new(doc: Option<&'a SchemaDocument>) -> Self {
        Self {
            doc,
            stack: Vec::new(),
            memo: HashMap::new(),
        }
    }

    fn unsupported(location: &str, reason: impl Into<String>) -> StructuralError {
        StructuralError::Unsupported {
            location: if location.is_empty() { "<root>".into() } else { location.to_string() },
            reason: reason.into(),
        }
    }

    fn follow(&mut self, reference: &str) -> Result<Structural, StructuralError> {
        let unresolved = || StructuralError::UnresolvedRef {
            reference: reference.to_string(),
        };
        let name = reference.strip_prefix(SCHEMA_REF_PREFIX).ok_or_else(unresolved)?;
        if let Some(done) = self.memo.get(name) {
            return Ok(done.clone());
        }
        if self.stack.iter().any(|n| n == name) {
            return Err(StructuralError::Recursive {
                name: name.to_string(),
            });
        }
        let target = self
            .doc
            .and_then(|doc| doc.resolve_ref(reference))
            .ok_or_else(unresolved)?;

        self.stack.push(name.to_string());
        let converted = self.convert(target, name);
        self.stack.pop();

        let converted = converted?;
        self.memo.insert(name.to_string(), converted.clone());
        Ok(converted)
    }

    fn convert(&mut self, node: &Value, location: &str) -> Result<Structural, StructuralError> {
        let obj = node
            .as_object()
            .ok_or_else(|| Self::unsupported(location, "schema must be an object"))?;

        let mut s = match obj.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.follow(reference)?,
            None => Structural::default(),
        };

        if let Some(all_of) = obj.get("allOf") {
            let all_of = all_of
                .as_array()
                .ok_or_else(|| Self::unsupported(location, "allOf must be an array"))?;
            for sub in all_of {
                match ref_only(sub) {
                    Some(reference) => {
                        let base = self.follow(reference)?;
                        s.absorb(base);
                    }
                    None => s.validation.all_of.push(sub.clone()),
                }
            }
        }

        match obj.get("type") {
            None => {}
            Some(Value::String(t)) => s.type_ = Some(t.clone()),
            Some(_) => return Err(Self::unsupported(location, "type must be a single string")),
        }
        if let Some(format) = obj.get("format").and_then(Value::as_str) {
            s.format = Some(format.to_string());
        }
        if let Some(nullable) = obj.get("nullable").and_then(Value::as_bool) {
            s.nullable = nullable;
        }
        if let Some(default) = obj.get("default") {
            s.default = Some(default.clone());
        }

        if let Some(properties) = obj.get("properties") {
            let properties = properties
                .as_object()
                .ok_or_else(|| Self::unsupported(location, "properties must be an object"))?;
            for (name, child) in properties {
                let child = self.convert(child, &format!("{location}.properties.{name}"))?;
                s.properties.insert(name.clone(), child);
            }
        }
        match obj.get("items") {
            None => {}
            Some(items @ Value::Object(_)) => {
                s.items = Some(Box::new(self.convert(items, &format!("{location}.items"))?));
            }
            Some(_) => return Err(Self::unsupported(location, "items must be a single schema")),
        }
        match obj.get("additionalProperties") {
            None => {}
            Some(Value::Bool(allowed)) => {
                s.additional_properties = Some(AdditionalProperties::Allowed(*allowed));
            }
            Some(schema @ Value::Object(_)) => {
                let child = self.convert(schema, &format!("{location}.additionalProperties"))?;
                s.additional_properties = Some(AdditionalProperties::Schema(Box::new(child)));
            }
            Some(_) => {
                return Err(Self::unsupported(
                    location,
                    "additionalProperties must be a boolean or a schema",
                ))
            }
        }

        read_value_validation(obj, &mut s.validation);
        read_extensions(obj, &mut s.extensions, location)?;
        if s.format.as_deref() == Some("int-or-string") {
            s.extensions.int_or_string = true;
        }
        Ok(s)
    }
}

impl Structural {
    /// Fill everything unset on `self` from `base`.
    fn absorb(&mut self, base: Structural) {
        if self.type_.is_none() {
            self.type_ = base.type_;
        }
        if self.format.is_none() {
            self.format = base.format;
        }
        self.nullable |= base.nullable;
        if self.default.is_none() {
            self.default = base.default;
        }
        for (name, child) in base.properties {
            self.properties.entry(name).or_insert(child);
        }
        if self.items.is_none() {
            self.items = base.items;
        }
        if self.additional_properties.is_none() {
            self.additional_properties = base.additional_properties;
        }
        let v = &mut self.validation;
        let b = base.validation;
        for r in b.required {
            if !v.required.contains(&r) {
                v.required.push(r);
            }
        }
        v.enum_values = v.enum_values.take().or(b.enum_values);
        v.pattern = v.pattern.take().or(b.pattern);
        v.minimum = v.minimum.or(b.minimum);
        v.maximum = v.maximum.or(b.maximum);
        v.exclusive_minimum |= b.exclusive_minimum;
        v.exclusive_maximum |= b.exclusive_maximum;
        v.multiple_of = v.multiple_of.or(b.multiple_of);
        v.min_length = v.min_length.or(b.min_length);
        v.max_length = v.max_length.or(b.max_length);
        v.min_items = v.min_items.or(b.min_items);
        v.max_items = v.max_items.or(b.max_items);
        v.unique_items |= b.unique_items;
        v.min_properties = v.min_properties.or(b.min_properties);
        v.max_properties = v.max_properties.or(b.max_properties);
        v.all_of.extend(b.all_of);
        v.any_of.extend(b.any_of);
        v.one_of.extend(b.one_of);
        v.not = v.not.take().or(b.not);

        let e = &mut self.extensions;
        let x = base.extensions;
        e.preserve_unknown_fields |= x.preserve_unknown_fields;
        e.int_or_string |= x.int_or_string;
        e.embedded_resource |= x.embedded_resource;
        e.list_type = e.list_type.or(x.list_type);
        if e.list_map_keys.is_empty() {
            e.list_map_keys = x.list_map_keys;
        }
        e.validations.extend(x.validations);
    }
}

/// `{"$ref": "..."}` with nothing else.
fn ref_only(node: &Value) -> Option<&str> {
    let obj = node.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get("$ref")?.as_str()
}

fn read_value_validation(obj: &Map<String, Value>, v: &mut ValueValidation) {
    let u64_of = |key: &str| obj.get(key).and_then(Value::as_u64);
    let f64_of = |key: &str| obj.get(key).and_then(Value::as_f64);
    let array_of = |key: &str| obj.get(key).and_then(Value::as_array).cloned();

    if let Some(required) = obj.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !v.required.iter().any(|r| r == name) {
                v.required.push(name.to_string());
            }
        }
    }
    if let Some(values) = array_of("enum") {
        v.enum_values = Some(values);
    }
    if let Some(pattern) = obj.get("pattern").and_then(Value::as_str) {
        v.pattern = Some(pattern.to_string());
    }
    v.minimum = f64_of("minimum").or(v.minimum);
    v.maximum = f64_of("maximum").or(v.maximum);
    v.exclusive_minimum |= obj.get("exclusiveMinimum").and_then(Value::as_bool).unwrap_or(false);
    v.exclusive_maximum |= obj.get("exclusiveMaximum").and_then(Value::as_bool).unwrap_or(false);
    v.multiple_of = f64_of("multipleOf").or(v.multiple_of);
    v.min_length = u64_of("minLength").or(v.min_length);
    v.max_length = u64_of("maxLength").or(v.max_length);
    v.min_items = u64_of("minItems").or(v.min_items);
    v.max_items = u64_of("maxItems").or(v.max_items);
    v.unique_items |= obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false);
    v.min_properties = u64_of("minProperties").or(v.min_properties);
    v.max_properties = u64_of("maxProperties").or(v.max_properties);
    if let Some(any_of) = array_of("anyOf") {
        v.any_of.extend(any_of);
    }
    if let Some(one_of) = array_of("oneOf") {
        v.one_of.extend(one_of);
    }
    if let Some(not) = obj.get("not") {
        v.not = Some(not.clone());
    }
}

fn read_extensions(obj: &Map<String, Value>, e: &mut Extensions, location: &str) -> Result<(), StructuralError> {
    let flag = |key: &str| obj.get(key).and_then(Value::as_bool).unwrap_or(false);
    e.preserve_unknown_fields |= flag("x-kubernetes-preserve-unknown-fields");
    e.int_or_string |= flag("x-kubernetes-int-or-string");
    e.embedded_resource |= flag("x-kubernetes-embedded-resource");

    if let Some(list_type) = obj.get("x-kubernetes-list-type").and_then(Value::as_str) {
        e.list_type = Some(match list_type {
            "atomic" => ListType::Atomic,
            "set" => ListType::Set,
            "map" => ListType::Map,
            other => {
                return Err(Converter::unsupported(
                    location,
                    format!("unknown x-kubernetes-list-type {other:?}"),
                ))
            }
        });
    }
    if let Some(keys) = obj.get("x-kubernetes-list-map-keys").and_then(Value::as_array) {
        e.list_map_keys = keys.iter().filter_map(Value::as_str).map(String::from).collect();
    }
    if let Some(rules) = obj.get("x-kubernetes-validations").and_then(Value::as_array) {
        for rule in rules {
            let text = |key: &str| rule.get(key).and_then(Value::as_str).map(String::from);
            let Some(expression) = text("rule") else {
                return Err(Converter::unsupported(location, "x-kubernetes-validations entry without rule"));
            };
            e.validations.push(ValidationRule {
                rule: expression,
                message: text("message"),
                message_expression: text("messageExpression"),
                field_path: text("fieldPath"),
                reason: text("reason"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(schemas: Value) -> SchemaDocument {
        SchemaDocument::from_value(json!({ "components": { "schemas": schemas } })).unwrap()
    }

    #[test]
    fn converts_properties_and_validations() {
        let s = Structural::from_value(&json!({
            "type": "object",
            "required": ["spec"],
            "properties": {
                "spec": {
                    "type": "object",
                    "properties": {
                        "replicas": { "type": "integer", "minimum": 0, "exclusiveMinimum": true },
                        "mode": { "type": "string", "enum": ["a", "b"] },
                        "ports": {
                            "type": "array",
                            "x-kubernetes-list-type": "map",
                            "x-kubernetes-list-map-keys": ["name"],
                            "items": { "type": "object", "properties": { "name": { "type": "string" } } }
                        }
                    },
                    "x-kubernetes-validations": [{ "rule": "self.replicas < 10", "message": "too many" }]
                }
            }
        }))
        .unwrap();

        assert!(s.is_object());
        assert_eq!(s.validation.required, vec!["spec".to_string()]);
        let spec = &s.properties["spec"];
        assert_eq!(spec.extensions.validations[0].message.as_deref(), Some("too many"));
        let replicas = &spec.properties["replicas"];
        assert_eq!(replicas.validation.minimum, Some(0.0));
        assert!(replicas.validation.exclusive_minimum);
        let ports = &spec.properties["ports"];
        assert_eq!(ports.extensions.list_type, Some(ListType::Map));
        assert_eq!(ports.extensions.list_map_keys, vec!["name".to_string()]);
        assert!(ports.items.as_ref().unwrap().is_object());
    }

    #[test]
    fn all_of_ref_wrapper_is_inlined_with_own_default() {
        let d = doc(json!({
            "Meta": { "type": "object", "properties": { "name": { "type": "string" } } },
            "Thing": {
                "type": "object",
                "properties": {
                    "metadata": {
                        "allOf": [{ "$ref": "#/components/schemas/Meta" }],
                        "default": {},
                        "description": "standard metadata"
                    }
                }
            }
        }));
        let s = Structural::from_openapi(&d, d.schema("Thing").unwrap())
            .unwrap()
            .unwrap();
        let meta = &s.properties["metadata"];
        assert!(meta.is_object());
        assert_eq!(meta.default, Some(json!({})));
        assert!(meta.properties.contains_key("name"));
        assert!(meta.validation.all_of.is_empty());
    }

    #[test]
    fn int_or_string_format_marks_the_extension() {
        let d = doc(json!({
            "IntOrString": { "format": "int-or-string", "oneOf": [{ "type": "integer" }, { "type": "string" }] },
            "HTTPGetAction": {
                "type": "object",
                "properties": { "port": { "$ref": "#/components/schemas/IntOrString" } }
            }
        }));
        let s = Structural::from_openapi(&d, d.schema("HTTPGetAction").unwrap())
            .unwrap()
            .unwrap();
        let port = &s.properties["port"];
        assert!(port.extensions.int_or_string);
        assert!(port.type_.is_none());
    }

    #[test]
    fn recursive_references_are_rejected() {
        let d = doc(json!({
            "Node": {
                "type": "object",
                "properties": { "children": { "type": "array", "items": { "$ref": "#/components/schemas/Node" } } }
            }
        }));
        let err = Structural::from_openapi(&d, d.schema("Node").unwrap()).unwrap_err();
        assert!(matches!(err, StructuralError::Recursive { ref name } if name == "Node"));
    }

    #[test]
    fn shared_references_are_not_recursion() {
        let d = doc(json!({
            "Leaf": { "type": "string" },
            "Pair": {
                "type": "object",
                "properties": {
                    "a": { "$ref": "#/components/schemas/Leaf" },
                    "b": { "$ref": "#/components/schemas/Leaf" }
                }
            }
        }));
        let s = Structural::from_openapi(&d, d.schema("Pair").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(s.properties["b"].type_.as_deref(), Some("string"));
    }

    #[test]
    fn empty_schema_has_no_structure() {
        let d = doc(json!({}));
        assert!(Structural::from_openapi(&d, &json!({})).unwrap().is_none());
    }

    #[test]
    fn unresolved_and_unsupported_constructs() {
        let d = doc(json!({}));
        assert!(matches!(
            Structural::from_openapi(&d, &json!({ "$ref": "#/components/schemas/Missing" })),
            Err(StructuralError::UnresolvedRef { .. })
        ));
        assert!(matches!(
            Structural::from_value(&json!({ "type": ["string", "null"] })),
            Err(StructuralError::Unsupported { .. })
        ));
        assert!(matches!(
            Structural::from_value(&json!({ "type": "array", "items": [{ "type": "string" }] })),
            Err(StructuralError::Unsupported { .. })
        ));
    }

    #[test]
    fn structural_violations_for_crd_schemas() {
        let s = Structural::from_value(&json!({
            "type": "object",
            "properties": {
                "untyped": { "description": "no type" },
                "open": { "x-kubernetes-preserve-unknown-fields": true },
                "port": { "x-kubernetes-int-or-string": true },
                "list": { "type": "array" }
            }
        }))
        .unwrap();
        let errors = s.structural_violations(&Path::new("schema"));
        let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
        assert_eq!(errors.len(), 2, "{rendered:?}");
        assert!(rendered[0].contains("list"));
        assert!(rendered[1].contains("untyped"));
    }

    #[test]
    fn unknown_field_policy() {
        let closed = Structural::from_value(&json!({ "type": "object", "properties": { "a": { "type": "string" } } })).unwrap();
        assert!(!closed.allows_unknown_fields());
        let open = Structural::from_value(&json!({ "type": "object" })).unwrap();
        assert!(open.allows_unknown_fields());
        let map = Structural::from_value(&json!({ "type": "object", "additionalProperties": { "type": "string" } })).unwrap();
        assert!(map.allows_unknown_fields());
        assert_eq!(map.property("anything").unwrap().type_.as_deref(), Some("string"));
    }
}
