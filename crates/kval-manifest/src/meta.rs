//! # Object Metadata
//!
//! Access to `metadata` for both schema-driven objects ([`Unstructured`])
//! and the native CRD model, the system fields the API server fills on
//! create, and the common `ObjectMeta` checks every object goes through.

use chrono::{SecondsFormat, Utc};
use kval_core::naming::{is_dns1123_label, is_qualified_name, is_valid_label_value};
use kval_core::{ErrorList, FieldError, Path};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Upper bound on the summed size of annotation keys and values.
pub const TOTAL_ANNOTATION_SIZE_LIMIT: usize = 256 * 1024;

/// Name validator: value and whether it is a `generateName` prefix.
pub type NameValidator<'a> = &'a dyn Fn(&str, bool) -> Vec<String>;

pub trait ObjectMetaAccess {
    fn metadata(&self) -> &Map<String, Value>;
    fn metadata_mut(&mut self) -> &mut Map<String, Value>;

    fn name(&self) -> &str {
        str_field(self.metadata(), "name")
    }

    fn namespace(&self) -> &str {
        str_field(self.metadata(), "namespace")
    }

    fn set_namespace(&mut self, namespace: &str) {
        let meta = self.metadata_mut();
        if namespace.is_empty() {
            meta.remove("namespace");
        } else {
            meta.insert("namespace".into(), Value::from(namespace));
        }
    }
}

fn str_field<'a>(meta: &'a Map<String, Value>, key: &str) -> &'a str {
    meta.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// A decoded object whose shape is known only through its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Unstructured {
    content: Map<String, Value>,
    metadata: Map<String, Value>,
}

impl Unstructured {
    /// Split off `metadata`. A missing `metadata` is empty; one that is not
    /// an object is a field error.
    pub fn from_value(value: Value) -> Result<Self, FieldError> {
        let Value::Object(mut content) = value else {
            return Err(FieldError::invalid(
                Path::root(),
                Value::Null,
                "object must be a map",
            ));
        };
        let metadata = match content.remove("metadata") {
            None => Map::new(),
            Some(Value::Object(metadata)) => metadata,
            Some(_) => {
                return Err(FieldError::invalid(
                    Path::new("metadata"),
                    Value::Null,
                    "metadata must be an object",
                ))
            }
        };
        Ok(Self { content, metadata })
    }

    pub fn api_version(&self) -> &str {
        str_field(&self.content, "apiVersion")
    }

    pub fn set_api_version(&mut self, api_version: &str) {
        self.content.insert("apiVersion".into(), Value::from(api_version));
    }

    pub fn kind(&self) -> &str {
        str_field(&self.content, "kind")
    }

    /// The full object, metadata included.
    pub fn to_value(&self) -> Value {
        let mut object = self.content.clone();
        object.insert("metadata".into(), Value::Object(self.metadata.clone()));
        Value::Object(object)
    }
}

impl ObjectMetaAccess for Unstructured {
    fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }
}

/// `creationTimestamp`, `uid` and `generation: 1`, as set on create.
pub fn fill_object_meta_system_fields(meta: &mut Map<String, Value>) {
    meta.insert(
        "creationTimestamp".into(),
        Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    meta.insert("uid".into(), Value::from(Uuid::new_v4().to_string()));
    meta.insert("generation".into(), Value::from(1));
}

/// Names that must be DNS-1123 subdomains. A `generateName` prefix may
/// end in `-`.
pub fn name_is_dns_subdomain(name: &str, prefix: bool) -> Vec<String> {
    let name = if prefix { mask_trailing_dash(name) } else { name.to_string() };
    kval_core::naming::is_dns1123_subdomain(&name)
}

/// Names that become a single URL path segment.
pub fn name_is_path_segment(name: &str, prefix: bool) -> Vec<String> {
    let mut errs = Vec::new();
    if !prefix {
        errs.extend(
            [".", ".."]
                .iter()
                .filter(|illegal| name == **illegal)
                .map(|illegal| format!("may not be '{illegal}'")),
        );
    }
    errs.extend(
        ["/", "%"]
            .iter()
            .filter(|illegal| name.contains(**illegal))
            .map(|illegal| format!("may not contain '{illegal}'")),
    );
    errs
}

const GENERATED_SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const GENERATED_SUFFIX_LEN: usize = 5;
const MAX_GENERATED_NAME_LEN: usize = 63;

/// `base` followed by a short random suffix, truncated so the result
/// stays within a DNS label.
pub fn generate_name(base: &str) -> String {
    let keep = base
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= MAX_GENERATED_NAME_LEN - GENERATED_SUFFIX_LEN)
        .last()
        .unwrap_or(0);
    let suffix: String = Uuid::new_v4()
        .as_bytes()
        .iter()
        .take(GENERATED_SUFFIX_LEN)
        .map(|b| GENERATED_SUFFIX_ALPHABET[*b as usize % GENERATED_SUFFIX_ALPHABET.len()] as char)
        .collect();
    format!("{}{suffix}", &base[..keep])
}

fn mask_trailing_dash(name: &str) -> String {
    match name.strip_suffix('-') {
        Some(stripped) if !stripped.is_empty() => format!("{stripped}a"),
        _ => name.to_string(),
    }
}

/// The common `ObjectMeta` checks for create.
pub fn validate_object_meta(
    meta: &Map<String, Value>,
    requires_namespace: bool,
    validate_name: NameValidator<'_>,
    path: &Path,
) -> ErrorList {
    let mut errors = ErrorList::new();

    let name = str_field(meta, "name");
    let generate_name = str_field(meta, "generateName");
    if !generate_name.is_empty() {
        for msg in validate_name(generate_name, true) {
            errors.push(FieldError::invalid(path.child("generateName"), generate_name, msg));
        }
    }
    if name.is_empty() {
        if generate_name.is_empty() {
            errors.push(FieldError::required(
                path.child("name"),
                "name or generateName is required",
            ));
        }
    } else {
        for msg in validate_name(name, false) {
            errors.push(FieldError::invalid(path.child("name"), name, msg));
        }
    }

    let namespace = str_field(meta, "namespace");
    if requires_namespace {
        if namespace.is_empty() {
            errors.push(FieldError::required(path.child("namespace"), ""));
        } else {
            for msg in is_dns1123_label(namespace) {
                errors.push(FieldError::invalid(path.child("namespace"), namespace, msg));
            }
        }
    } else if !namespace.is_empty() {
        errors.push(FieldError::forbidden(
            path.child("namespace"),
            "not allowed on this type",
        ));
    }

    errors.extend(validate_labels(meta.get("labels"), &path.child("labels")));
    errors.extend(validate_annotations(meta.get("annotations"), &path.child("annotations")));
    errors
}

fn validate_labels(labels: Option<&Value>, path: &Path) -> ErrorList {
    let mut errors = ErrorList::new();
    let Some(labels) = labels.and_then(Value::as_object) else {
        return errors;
    };
    for (key, value) in labels {
        for msg in is_qualified_name(key) {
            errors.push(FieldError::invalid(path.clone(), key.as_str(), msg));
        }
        let value = value.as_str().unwrap_or_default();
        for msg in is_valid_label_value(value) {
            errors.push(FieldError::invalid(path.clone(), value, msg));
        }
    }
    errors
}

fn validate_annotations(annotations: Option<&Value>, path: &Path) -> ErrorList {
    let mut errors = ErrorList::new();
    let Some(annotations) = annotations.and_then(Value::as_object) else {
        return errors;
    };
    let mut total = 0;
    for (key, value) in annotations {
        for msg in is_qualified_name(&key.to_lowercase()) {
            errors.push(FieldError::invalid(path.clone(), key.as_str(), msg));
        }
        total += key.len() + value.as_str().map_or(0, str::len);
    }
    if total > TOTAL_ANNOTATION_SIZE_LIMIT {
        errors.push(FieldError::too_long(path.clone(), TOTAL_ANNOTATION_SIZE_LIMIT));
    }
    errors
}
