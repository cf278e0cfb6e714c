//! # CustomResourceDefinitions on Disk
//!
//! Walks a directory for CRD manifests and synthesizes one OpenAPI document
//! per served group-version, the way the API server publishes CRD schemas:
//!
//! - component key `<reversed group>.<version>.<Kind>`;
//! - `x-kubernetes-group-version-kind` naming the kind;
//! - `x-kubernetes-scope` carrying `spec.scope`;
//! - `apiVersion`, `kind` and `metadata` properties injected at the root.
//!
//! The directory is crawled on first lookup and never again. Files that
//! cannot be read or parsed are skipped with a warning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use kval_core::yaml::{is_empty_document, parse_yaml, split_documents};
use kval_core::GroupVersion;
use once_cell::sync::OnceCell;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document::{SchemaDocument, GVK_EXTENSION, SCOPE_EXTENSION};
use crate::error::SourceError;
use crate::source::SchemaSource;

const ORIGIN: &str = "local-crds";
const CRD_GROUP: &str = "apiextensions.k8s.io";
const CRD_KIND: &str = "CustomResourceDefinition";

#[derive(Debug, Default)]
pub struct LocalCrdFiles {
    dir: Option<PathBuf>,
    index: OnceCell<HashMap<GroupVersion, SchemaDocument>>,
}

impl LocalCrdFiles {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            index: OnceCell::new(),
        }
    }

    fn crawl(dir: &Path) -> HashMap<GroupVersion, SchemaDocument> {
        let mut index = HashMap::new();
        let files = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(origin = ORIGIN, "skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_manifest(entry.path()));

        for entry in files {
            let text = match std::fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(e) => {
                    warn!(origin = ORIGIN, path = %entry.path().display(), "skipping unreadable file: {e}");
                    continue;
                }
            };
            for doc in split_documents(&text) {
                if is_empty_document(&doc) {
                    continue;
                }
                match parse_yaml(&doc) {
                    Ok(value) if is_crd(&value) => add_crd(&mut index, &value),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(origin = ORIGIN, path = %entry.path().display(), "skipping unparsable document: {e}");
                    }
                }
            }
        }
        debug!(origin = ORIGIN, group_versions = index.len(), "crawled CRD directory");
        index
    }
}

impl SchemaSource for LocalCrdFiles {
    fn name(&self) -> &str {
        ORIGIN
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let index = self.index.get_or_init(|| Self::crawl(dir));
        Ok(index.get(gv).cloned())
    }

    fn check(&self) -> Result<(), SourceError> {
        match &self.dir {
            Some(dir) if !dir.is_dir() => Err(SourceError::MissingDirectory {
                origin: ORIGIN.into(),
                path: dir.clone(),
            }),
            _ => Ok(()),
        }
    }
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml" | "json")
    )
}

fn is_crd(value: &Value) -> bool {
    let api_version = value.get("apiVersion").and_then(Value::as_str).unwrap_or_default();
    let kind = value.get("kind").and_then(Value::as_str).unwrap_or_default();
    kind == CRD_KIND && api_version.split('/').next() == Some(CRD_GROUP)
}

/// `stable.example.com` → `com.example.stable`.
fn reversed_group(group: &str) -> String {
    group.split('.').rev().collect::<Vec<_>>().join(".")
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Served versions and their schemas; v1beta1's top-level `version` and
/// `validation` are folded in.
fn served_versions(spec: &Value) -> Vec<(String, Option<Value>)> {
    let shared_schema = spec.pointer("/validation/openAPIV3Schema").cloned();
    let mut versions: Vec<(String, Option<Value>)> = spec
        .get("versions")
        .and_then(Value::as_array)
        .map(|versions| {
            versions
                .iter()
                .filter(|v| v.get("served").and_then(Value::as_bool).unwrap_or(true))
                .filter_map(|v| {
                    let name = v.get("name")?.as_str()?.to_string();
                    let schema = v
                        .pointer("/schema/openAPIV3Schema")
                        .cloned()
                        .or_else(|| shared_schema.clone());
                    Some((name, schema))
                })
                .collect()
        })
        .unwrap_or_default();

    if versions.is_empty() {
        if let Some(name) = spec.get("version").and_then(Value::as_str) {
            versions.push((name.to_string(), shared_schema));
        }
    }
    versions
}

fn add_crd(index: &mut HashMap<GroupVersion, SchemaDocument>, crd: &Value) {
    let Some(spec) = crd.get("spec") else {
        return;
    };
    let (Some(group), Some(kind)) = (str_at(spec, "/group"), str_at(spec, "/names/kind")) else {
        warn!(origin = ORIGIN, "skipping CRD without spec.group or spec.names.kind");
        return;
    };
    let scope = str_at(spec, "/scope").unwrap_or("Namespaced");

    for (version, schema) in served_versions(spec) {
        let mut node = schema.unwrap_or_else(|| {
            json!({ "type": "object", "x-kubernetes-preserve-unknown-fields": true })
        });
        inject_type_meta(&mut node);
        if let Some(obj) = node.as_object_mut() {
            obj.insert(
                GVK_EXTENSION.into(),
                json!([{ "group": group, "version": version, "kind": kind }]),
            );
            obj.insert(SCOPE_EXTENSION.into(), json!(scope));
        }
        let key = format!("{}.{}.{}", reversed_group(group), version, kind);
        debug!(origin = ORIGIN, component = %key, "registered CRD schema");
        index
            .entry(GroupVersion::new(group, version.clone()))
            .or_insert_with(SchemaDocument::empty)
            .insert_schema(key, node);
    }
}

/// Add `apiVersion`, `kind` and `metadata` to a CRD root schema.
///
/// Constraints a CRD declares on `metadata` (only `name` and `generateName`
/// are honoured by the API server) are layered over the standard shape.
fn inject_type_meta(node: &mut Value) {
    let Some(root) = node.as_object_mut() else {
        return;
    };
    let properties = root
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(properties) = properties.as_object_mut() else {
        return;
    };
    properties
        .entry("apiVersion")
        .or_insert_with(|| json!({ "type": "string" }));
    properties
        .entry("kind")
        .or_insert_with(|| json!({ "type": "string" }));

    let mut metadata = object_meta_schema();
    if let Some(declared) = properties.get("metadata").and_then(|m| m.get("properties")) {
        for field in ["name", "generateName"] {
            if let (Some(constraints), Some(Value::Object(target))) = (
                declared.get(field).and_then(Value::as_object),
                metadata.pointer_mut(&format!("/properties/{field}")),
            ) {
                for (k, v) in constraints {
                    target.insert(k.clone(), v.clone());
                }
            }
        }
    }
    properties.insert("metadata".into(), metadata);
}

/// The `ObjectMeta` shape every custom resource accepts.
fn object_meta_schema() -> Value {
    let string = json!({ "type": "string" });
    let string_map = json!({ "type": "object", "additionalProperties": { "type": "string" } });
    let open_object = json!({ "type": "object", "x-kubernetes-preserve-unknown-fields": true });
    json!({
        "type": "object",
        "properties": {
            "name": string,
            "generateName": string,
            "namespace": string,
            "uid": string,
            "resourceVersion": string,
            "selfLink": string,
            "creationTimestamp": string,
            "deletionTimestamp": string,
            "deletionGracePeriodSeconds": { "type": "integer" },
            "generation": { "type": "integer" },
            "labels": string_map,
            "annotations": string_map,
            "finalizers": { "type": "array", "items": string },
            "ownerReferences": { "type": "array", "items": open_object },
            "managedFields": { "type": "array", "items": open_object }
        }
    })
}
