//! Wire model for `CustomResourceDefinition` in both served versions.
//!
//! Decoding is lenient about unknown fields, like the API server's
//! universal decoder. `v1beta1` documents are folded into the `v1` shape
//! on decode so validation only deals with one layout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::meta::ObjectMetaAccess;

pub const CRD_GROUP: &str = "apiextensions.k8s.io";
pub const CRD_KIND: &str = "CustomResourceDefinition";
pub const SERVED_VERSIONS: [&str; 2] = ["v1", "v1beta1"];

pub const SCOPE_NAMESPACED: &str = "Namespaced";
pub const SCOPE_CLUSTER: &str = "Cluster";
pub const CONVERSION_NONE: &str = "None";
pub const CONVERSION_WEBHOOK: &str = "Webhook";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceDefinition {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub spec: CustomResourceDefinitionSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceDefinitionSpec {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub names: CustomResourceDefinitionNames,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub versions: Vec<CustomResourceDefinitionVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<CustomResourceConversion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_unknown_fields: Option<bool>,

    // Top-level forms that only exist in v1beta1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<CustomResourceValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subresources: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_printer_columns: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceDefinitionNames {
    #[serde(default)]
    pub plural: String,
    #[serde(default)]
    pub singular: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub list_kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceDefinitionVersion {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub served: bool,
    #[serde(default)]
    pub storage: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<CustomResourceValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subresources: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_printer_columns: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectable_fields: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomResourceValidation {
    #[serde(rename = "openAPIV3Schema", default, skip_serializing_if = "Option::is_none")]
    pub open_api_v3_schema: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResourceConversion {
    #[serde(default)]
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Value>,
    /// v1beta1 spelling of `webhook.clientConfig`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_client_config: Option<Value>,
}

impl CustomResourceDefinition {
    /// The version segment of `apiVersion`.
    pub fn served_version(&self) -> &str {
        self.api_version
            .rsplit_once('/')
            .map_or(self.api_version.as_str(), |(_, version)| version)
    }

    /// Move the v1beta1 top-level `version`, `validation`, `subresources`
    /// and printer columns onto the per-version entries.
    pub fn fold_v1beta1(&mut self) {
        let spec = &mut self.spec;
        if spec.versions.is_empty() {
            if let Some(name) = spec.version.take() {
                spec.versions.push(CustomResourceDefinitionVersion {
                    name,
                    served: true,
                    storage: true,
                    ..CustomResourceDefinitionVersion::default()
                });
            }
        }
        let validation = spec.validation.take();
        let subresources = spec.subresources.take();
        let columns = std::mem::take(&mut spec.additional_printer_columns);
        for version in &mut spec.versions {
            if version.schema.is_none() {
                version.schema.clone_from(&validation);
            }
            if version.subresources.is_none() {
                version.subresources.clone_from(&subresources);
            }
            if version.additional_printer_columns.is_empty() {
                version.additional_printer_columns.clone_from(&columns);
            }
        }
        if let Some(conversion) = &mut spec.conversion {
            if conversion.webhook.is_none() {
                if let Some(client_config) = conversion.webhook_client_config.take() {
                    conversion.webhook = Some(serde_json::json!({ "clientConfig": client_config }));
                }
            }
        }
    }

    /// Server-side defaults for fields a create request may leave empty.
    pub fn apply_defaults(&mut self) {
        let v1beta1 = self.served_version() == "v1beta1";
        let spec = &mut self.spec;
        if spec.names.singular.is_empty() {
            spec.names.singular = spec.names.kind.to_lowercase();
        }
        if spec.names.list_kind.is_empty() && !spec.names.kind.is_empty() {
            spec.names.list_kind = format!("{}List", spec.names.kind);
        }
        let conversion = spec.conversion.get_or_insert_with(Default::default);
        if conversion.strategy.is_empty() {
            conversion.strategy = CONVERSION_NONE.to_string();
        }
        if v1beta1 {
            if spec.scope.is_empty() {
                spec.scope = SCOPE_NAMESPACED.to_string();
            }
            if spec.preserve_unknown_fields.is_none() {
                spec.preserve_unknown_fields = Some(true);
            }
        }
    }
}

impl ObjectMetaAccess for CustomResourceDefinition {
    fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.metadata
    }
}
