//! # Group / Version / Kind Identity
//!
//! A manifest's schema is identified by the triple (group, version, kind),
//! derived from its `apiVersion` and `kind` fields. The legacy core API has
//! an empty group and is written as bare `v1`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Group name substituted for the empty legacy core group when a document
/// is handed to the generic admission path, which expects a non-empty group.
pub const CORE_GROUP: &str = "core";

/// An API group and version, e.g. `apps/v1` or the legacy core `v1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// Parse an `apiVersion` string.
    ///
    /// `""` is the empty group-version, `"v1"` has an empty group and
    /// `"apps/v1"` splits on the slash. More than one slash is rejected.
    pub fn parse(api_version: &str) -> Result<Self, CoreError> {
        if api_version.is_empty() {
            return Ok(Self::default());
        }
        match api_version.split_once('/') {
            None => Ok(Self::new("", api_version)),
            Some((group, version)) if !version.contains('/') => Ok(Self::new(group, version)),
            Some(_) => Err(CoreError::InvalidGroupVersion(api_version.to_string())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_empty() && self.version.is_empty()
    }

    /// True for the historically groupless core API (`apiVersion: v1`).
    pub fn is_legacy_core(&self) -> bool {
        self.group.is_empty() && self.version == "v1"
    }

    /// The `apiVersion` form of this group-version.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Relative OpenAPI path: `api/v1` for the core group, otherwise
    /// `apis/<group>/<version>`.
    pub fn openapi_path(&self) -> String {
        if self.group.is_empty() {
            format!("api/{}", self.version)
        } else {
            format!("apis/{}/{}", self.group, self.version)
        }
    }

    pub fn with_kind(&self, kind: impl Into<String>) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group.clone(),
            version: self.version.clone(),
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_version())
    }
}

/// Identity of a manifest's schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Build a GVK from the two type-metadata fields.
    ///
    /// An unparsable `apiVersion` keeps only the kind, so the document still
    /// has an identity to report against but will not resolve a schema.
    pub fn from_api_version_and_kind(api_version: &str, kind: &str) -> Self {
        match GroupVersion::parse(api_version) {
            Ok(gv) => gv.with_kind(kind),
            Err(_) => Self::new("", "", kind),
        }
    }

    /// An all-empty GVK carries no type identity at all.
    pub fn is_empty(&self) -> bool {
        self.group.is_empty() && self.version.is_empty() && self.kind.is_empty()
    }

    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group.clone(), self.version.clone())
    }

    /// `Kind.group`, or just `Kind` for the core group.
    pub fn qualified_kind(&self) -> String {
        if self.group.is_empty() {
            self.kind.clone()
        } else {
            format!("{}.{}", self.kind, self.group)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.group_version(), self.kind)
    }
}

/// The `apiVersion` / `kind` header shared by every manifest.
///
/// Deserializing a full manifest into `TypeMeta` ignores every other field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMeta {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl TypeMeta {
    pub fn group_version_kind(&self) -> GroupVersionKind {
        GroupVersionKind::from_api_version_and_kind(&self.api_version, &self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_legacy_core_version() {
        let gv = GroupVersion::parse("v1").unwrap();
        assert_eq!(gv, GroupVersion::new("", "v1"));
        assert!(gv.is_legacy_core());
        assert_eq!(gv.openapi_path(), "api/v1");
    }

    #[test]
    fn parse_grouped_version() {
        let gv = GroupVersion::parse("apps/v1").unwrap();
        assert_eq!(gv.group, "apps");
        assert_eq!(gv.version, "v1");
        assert!(!gv.is_legacy_core());
        assert_eq!(gv.openapi_path(), "apis/apps/v1");
        assert_eq!(gv.to_string(), "apps/v1");
    }

    #[test]
    fn parse_empty_is_empty() {
        assert!(GroupVersion::parse("").unwrap().is_empty());
    }

    #[test]
    fn parse_rejects_extra_slashes() {
        assert!(matches!(
            GroupVersion::parse("a/b/c"),
            Err(CoreError::InvalidGroupVersion(_))
        ));
    }

    #[test]
    fn gvk_from_unparsable_api_version_keeps_kind() {
        let gvk = GroupVersionKind::from_api_version_and_kind("a/b/c", "Widget");
        assert_eq!(gvk, GroupVersionKind::new("", "", "Widget"));
        assert!(!gvk.is_empty());
    }

    #[test]
    fn gvk_empty_only_when_all_parts_empty() {
        assert!(GroupVersionKind::default().is_empty());
        assert!(!GroupVersionKind::new("", "v1", "").is_empty());
        assert!(!GroupVersionKind::new("", "", "ConfigMap").is_empty());
    }

    #[test]
    fn type_meta_ignores_other_fields() {
        let meta: TypeMeta = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
        }))
        .unwrap();
        assert_eq!(
            meta.group_version_kind(),
            GroupVersionKind::new("apps", "v1", "Deployment")
        );
    }

    #[test]
    fn type_meta_missing_fields_default_to_empty() {
        let meta: TypeMeta = serde_json::from_value(serde_json::json!({"data": {}})).unwrap();
        assert!(meta.group_version_kind().is_empty());
    }

    #[test]
    fn gvk_display_and_qualified_kind() {
        let gvk = GroupVersionKind::new("apps", "v1", "Deployment");
        assert_eq!(gvk.to_string(), "apps/v1, Kind=Deployment");
        assert_eq!(gvk.qualified_kind(), "Deployment.apps");
        assert_eq!(
            GroupVersionKind::new("", "v1", "Pod").qualified_kind(),
            "Pod"
        );
    }
}
