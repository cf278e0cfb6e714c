//! # OpenAPI v3 Documents
//!
//! A [`SchemaDocument`] is the OpenAPI v3 document for one group-version,
//! as published by the API server under `/openapi/v3/<path>`. kval reads
//! three parts of it:
//!
//! - `components.schemas`: named schema nodes. A node describes a top-level
//!   kind when its `x-kubernetes-group-version-kind` extension lists that
//!   kind.
//! - `paths`: REST operations, each tagged with the GVK it serves. Used to
//!   infer whether a kind is namespaced.
//! - `$ref` targets of the form `#/components/schemas/<name>`.

use kval_core::GroupVersionKind;
use serde_json::{json, Map, Value};

pub const GVK_EXTENSION: &str = "x-kubernetes-group-version-kind";
pub const SCOPE_EXTENSION: &str = "x-kubernetes-scope";

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Whether objects of a kind live inside a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

impl Scope {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Namespaced" => Some(Scope::Namespaced),
            "Cluster" => Some(Scope::Cluster),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Namespaced => "Namespaced",
            Scope::Cluster => "Cluster",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    root: Value,
}

impl SchemaDocument {
    /// Wrap a parsed document. Returns `None` unless `root` is a JSON object.
    pub fn from_value(root: Value) -> Option<Self> {
        root.is_object().then_some(Self { root })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let root: Value = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        Self::from_value(root).ok_or_else(|| "document root is not an object".to_string())
    }

    /// A document with no schemas and no paths.
    pub fn empty() -> Self {
        Self {
            root: json!({
                "openapi": "3.0.0",
                "info": { "title": "Kubernetes", "version": "unversioned" },
                "paths": {},
                "components": { "schemas": {} }
            }),
        }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    /// The `components.schemas` map.
    pub fn schemas(&self) -> Option<&Map<String, Value>> {
        self.root.get("components")?.get("schemas")?.as_object()
    }

    pub fn schema(&self, name: &str) -> Option<&Value> {
        self.schemas()?.get(name)
    }

    /// Insert or replace a component schema.
    pub fn insert_schema(&mut self, name: impl Into<String>, node: Value) {
        let Some(root) = self.root.as_object_mut() else {
            return;
        };
        let components = root
            .entry("components")
            .or_insert_with(|| Value::Object(Map::new()));
        if !components.is_object() {
            *components = Value::Object(Map::new());
        }
        let schemas = components
            .as_object_mut()
            .map(|c| c.entry("schemas").or_insert_with(|| Value::Object(Map::new())));
        if let Some(Value::Object(schemas)) = schemas {
            schemas.insert(name.into(), node);
        }
    }

    /// Resolve a local `$ref` (`#/components/schemas/<name>`).
    pub fn resolve_ref(&self, reference: &str) -> Option<&Value> {
        let name = reference.strip_prefix(SCHEMA_REF_PREFIX)?;
        self.schema(name)
    }

    /// The first component (in key order) whose GVK extension lists `gvk`.
    pub fn find_kind(&self, gvk: &GroupVersionKind) -> Option<(&str, &Value)> {
        self.schemas()?
            .iter()
            .find(|(_, node)| declares_gvk(node, gvk))
            .map(|(name, node)| (name.as_str(), node))
    }

    /// Infer a kind's scope from the document's REST paths.
    ///
    /// Namespaced if any path containing `{namespace}` serves the GVK,
    /// cluster-scoped if only paths without it do, `None` when no path
    /// mentions the GVK.
    pub fn path_scope(&self, gvk: &GroupVersionKind) -> Option<Scope> {
        let paths = self.root.get("paths")?.as_object()?;
        let mut seen = false;
        for (path, item) in paths {
            let Some(operations) = item.as_object() else {
                continue;
            };
            if operations.values().any(|op| declares_gvk(op, gvk)) {
                if path.contains("{namespace}") {
                    return Some(Scope::Namespaced);
                }
                seen = true;
            }
        }
        seen.then_some(Scope::Cluster)
    }

    /// Merge `other` into `self`; keys already present in `self` win.
    ///
    /// `components.*` and `paths` merge entry by entry, every other
    /// top-level key as a whole.
    pub fn merge_from(&mut self, other: &SchemaDocument) {
        let (Some(dst), Some(src)) = (self.root.as_object_mut(), other.root.as_object()) else {
            return;
        };
        for (key, value) in src {
            match (dst.get_mut(key), value) {
                (None, _) => {
                    dst.insert(key.clone(), value.clone());
                }
                (Some(Value::Object(existing)), Value::Object(incoming)) if key == "components" => {
                    for (section, entries) in incoming {
                        match (existing.get_mut(section), entries) {
                            (None, _) => {
                                existing.insert(section.clone(), entries.clone());
                            }
                            (Some(Value::Object(have)), Value::Object(add)) => {
                                merge_missing(have, add);
                            }
                            _ => {}
                        }
                    }
                }
                (Some(Value::Object(existing)), Value::Object(incoming)) if key == "paths" => {
                    merge_missing(existing, incoming);
                }
                _ => {}
            }
        }
    }
}

fn merge_missing(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in src {
        if !dst.contains_key(key) {
            dst.insert(key.clone(), value.clone());
        }
    }
}

/// True when `node`'s GVK extension names `gvk`.
///
/// Schema components carry a list of entries, path operations a single one.
pub fn declares_gvk(node: &Value, gvk: &GroupVersionKind) -> bool {
    let matches = |entry: &Value| {
        let field = |name: &str| entry.get(name).and_then(Value::as_str).unwrap_or_default();
        field("group") == gvk.group && field("version") == gvk.version && field("kind") == gvk.kind
    };
    match node.get(GVK_EXTENSION) {
        Some(Value::Array(entries)) => entries.iter().any(matches),
        Some(entry @ Value::Object(_)) => matches(entry),
        _ => false,
    }
}
