//! # Schema Patches
//!
//! RFC 6902 JSON Patch documents applied to resolved OpenAPI documents, and
//! the loaders that find a patch for a group-version.
//!
//! Application is all-or-nothing: operations run in order on a working
//! copy that replaces the target only when every operation succeeded.

use std::fmt::Debug;
use std::path::PathBuf;

use kval_core::yaml::parse_yaml;
use kval_core::GroupVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::embedded;
use crate::error::{PatchError, SourceError};

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    operations: Vec<PatchOperation>,
}

impl Patch {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self { operations }
    }

    /// Decode a JSON or YAML array of operations.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let value = parse_yaml(text).map_err(|e| PatchError::Malformed {
            reason: e.to_string(),
        })?;
        serde_json::from_value(value).map_err(|e| PatchError::Malformed {
            reason: e.to_string(),
        })
    }

    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn apply(&self, target: &mut Value) -> Result<(), PatchError> {
        let mut working = target.clone();
        for (index, op) in self.operations.iter().enumerate() {
            apply_operation(&mut working, op).map_err(|error| PatchError::Operation {
                index,
                error: Box::new(error),
            })?;
        }
        *target = working;
        Ok(())
    }
}

fn apply_operation(doc: &mut Value, op: &PatchOperation) -> Result<(), PatchError> {
    match op {
        PatchOperation::Add { path, value } => add(doc, path, value.clone()),
        PatchOperation::Remove { path } => remove(doc, path).map(drop),
        PatchOperation::Replace { path, value } => {
            let slot = doc
                .pointer_mut(checked(path)?)
                .ok_or_else(|| PatchError::PathNotFound {
                    pointer: path.clone(),
                })?;
            *slot = value.clone();
            Ok(())
        }
        PatchOperation::Move { from, path } => {
            if path.starts_with(&format!("{from}/")) {
                return Err(PatchError::MoveIntoChild {
                    from: from.clone(),
                    pointer: path.clone(),
                });
            }
            if from == path {
                return Ok(());
            }
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOperation::Copy { from, path } => {
            let value = doc
                .pointer(checked(from)?)
                .cloned()
                .ok_or_else(|| PatchError::PathNotFound {
                    pointer: from.clone(),
                })?;
            add(doc, path, value)
        }
        PatchOperation::Test { path, value } => match doc.pointer(checked(path)?) {
            Some(actual) if actual == value => Ok(()),
            Some(_) => Err(PatchError::TestFailed {
                pointer: path.clone(),
            }),
            None => Err(PatchError::PathNotFound {
                pointer: path.clone(),
            }),
        },
    }
}

fn checked(pointer: &str) -> Result<&str, PatchError> {
    if pointer.is_empty() || pointer.starts_with('/') {
        Ok(pointer)
    } else {
        Err(PatchError::InvalidPointer {
            pointer: pointer.to_string(),
        })
    }
}

/// Split a pointer into its parent pointer and unescaped last token.
fn split_last(pointer: &str) -> Result<(&str, String), PatchError> {
    let pointer = checked(pointer)?;
    let (parent, last) = pointer
        .rsplit_once('/')
        .ok_or_else(|| PatchError::InvalidPointer {
            pointer: pointer.to_string(),
        })?;
    Ok((parent, last.replace("~1", "/").replace("~0", "~")))
}

fn parse_index(token: &str, pointer: &str) -> Result<usize, PatchError> {
    let valid = !token.is_empty()
        && token.chars().all(|c| c.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    valid
        .then(|| token.parse().ok())
        .flatten()
        .ok_or_else(|| PatchError::InvalidIndex {
            pointer: pointer.to_string(),
        })
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    if path.is_empty() {
        *doc = value;
        return Ok(());
    }
    let (parent, token) = split_last(path)?;
    let not_found = || PatchError::PathNotFound {
        pointer: path.to_string(),
    };
    match doc.pointer_mut(parent).ok_or_else(not_found)? {
        Value::Object(map) => {
            map.insert(token, value);
            Ok(())
        }
        Value::Array(items) => {
            if token == "-" {
                items.push(value);
                return Ok(());
            }
            let index = parse_index(&token, path)?;
            if index > items.len() {
                return Err(PatchError::InvalidIndex {
                    pointer: path.to_string(),
                });
            }
            items.insert(index, value);
            Ok(())
        }
        _ => Err(not_found()),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    let (parent, token) = split_last(path)?;
    let not_found = || PatchError::PathNotFound {
        pointer: path.to_string(),
    };
    match doc.pointer_mut(parent).ok_or_else(not_found)? {
        Value::Object(map) => map.remove(&token).ok_or_else(not_found),
        Value::Array(items) => {
            let index = parse_index(&token, path)?;
            if index >= items.len() {
                return Err(PatchError::InvalidIndex {
                    pointer: path.to_string(),
                });
            }
            Ok(items.remove(index))
        }
        _ => Err(not_found()),
    }
}

/// Finds the patch for a group-version.
pub trait PatchLoader: Debug + Send + Sync {
    /// `Ok(None)` when there is nothing to apply.
    fn load(&self, gv: &GroupVersion) -> Result<Option<Patch>, SourceError>;

    fn check(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

const PATCH_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Patches on disk at `<dir>/api/v1.json`, `<dir>/apis/<group>/<version>.yaml`, ...
#[derive(Debug, Clone, Default)]
pub struct DirectoryPatchLoader {
    dir: Option<PathBuf>,
}

impl DirectoryPatchLoader {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl PatchLoader for DirectoryPatchLoader {
    fn load(&self, gv: &GroupVersion) -> Result<Option<Patch>, SourceError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let stem = dir.join(gv.openapi_path());
        for ext in PATCH_EXTENSIONS {
            let path = stem.with_extension(ext);
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|error| SourceError::Io {
                origin: "schema-patches".into(),
                path: path.clone(),
                error,
            })?;
            let patch = Patch::parse(&text).map_err(|e| SourceError::Parse {
                origin: "schema-patches".into(),
                location: path.display().to_string(),
                reason: e.to_string(),
            })?;
            return Ok(Some(patch));
        }
        Ok(None)
    }

    fn check(&self) -> Result<(), SourceError> {
        match &self.dir {
            Some(dir) if !dir.is_dir() => Err(SourceError::MissingDirectory {
                origin: "schema-patches".into(),
                path: dir.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// Patches compiled into the binary for a Kubernetes minor version.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedPatchLoader {
    version: Option<String>,
}

impl EmbeddedPatchLoader {
    pub fn new(version: Option<&str>) -> Self {
        Self {
            version: version.and_then(embedded::normalize_version),
        }
    }
}

impl PatchLoader for EmbeddedPatchLoader {
    fn load(&self, gv: &GroupVersion) -> Result<Option<Patch>, SourceError> {
        let Some(version) = &self.version else {
            return Ok(None);
        };
        let Some(text) = embedded::patch(version, &gv.openapi_path()) else {
            return Ok(None);
        };
        Patch::parse(text).map(Some).map_err(|e| SourceError::Parse {
            origin: "embedded-patches".into(),
            location: format!("{version}/{}", gv.openapi_path()),
            reason: e.to_string(),
        })
    }
}
