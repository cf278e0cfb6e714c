//! # Release Documents from GitHub
//!
//! Every Kubernetes release branch carries the generated OpenAPI v3
//! documents under `api/openapi-spec/v3/`. File names flatten the discovery
//! path with `__`: `api__v1_openapi.json`, `apis__apps__v1_openapi.json`.

use std::time::Duration;

use kval_core::{GroupVersion, OnceMap};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use tracing::debug;

use crate::document::SchemaDocument;
use crate::embedded;
use crate::error::SourceError;
use crate::http::{build_client, fetch_json, ClientOptions};
use crate::source::SchemaSource;

const ORIGIN: &str = "github-builtins";

const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com/kubernetes/kubernetes";

#[derive(Debug)]
pub struct GitHubBuiltins {
    version: Option<String>,
    base_url: String,
    timeout: Option<Duration>,
    client: OnceCell<Client>,
    cache: OnceMap<GroupVersion, Option<SchemaDocument>>,
}

impl GitHubBuiltins {
    pub fn new(version: Option<&str>) -> Self {
        Self {
            version: version.and_then(embedded::normalize_version),
            base_url: GITHUB_RAW_BASE.to_string(),
            timeout: None,
            client: OnceCell::new(),
            cache: OnceMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Point at a mirror of `raw.githubusercontent.com/kubernetes/kubernetes`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// URL of the release document for `gv`.
    pub fn document_url(&self, version: &str, gv: &GroupVersion) -> String {
        let file = gv.openapi_path().replace('/', "__");
        format!(
            "{}/release-{version}/api/openapi-spec/v3/{file}_openapi.json",
            self.base_url
        )
    }

    fn fetch(&self, version: &str, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let client = self.client.get_or_try_init(|| {
            build_client(
                ORIGIN,
                ClientOptions {
                    timeout: self.timeout,
                    ..ClientOptions::default()
                },
            )
        })?;
        let url = self.document_url(version, gv);
        debug!(origin = ORIGIN, %url, "fetching release schema");
        let Some(value) = fetch_json(client, ORIGIN, &url)? else {
            return Ok(None);
        };
        SchemaDocument::from_value(value)
            .map(Some)
            .ok_or_else(|| SourceError::Parse {
                origin: ORIGIN.into(),
                location: url,
                reason: "document root is not an object".into(),
            })
    }
}

impl SchemaSource for GitHubBuiltins {
    fn name(&self) -> &str {
        ORIGIN
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let Some(version) = &self.version else {
            return Ok(None);
        };
        self.cache.get_or_try_init(gv, || self.fetch(version, gv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_document_urls() {
        let source = GitHubBuiltins::new(Some("v1.27.1"));
        assert_eq!(
            source.document_url("1.27", &GroupVersion::new("", "v1")),
            "https://raw.githubusercontent.com/kubernetes/kubernetes/release-1.27/api/openapi-spec/v3/api__v1_openapi.json"
        );
        assert_eq!(
            source.document_url("1.27", &GroupVersion::new("apps", "v1")),
            "https://raw.githubusercontent.com/kubernetes/kubernetes/release-1.27/api/openapi-spec/v3/apis__apps__v1_openapi.json"
        );
    }

    #[test]
    fn no_version_means_not_found() {
        let source = GitHubBuiltins::new(None);
        assert!(source.get(&GroupVersion::new("", "v1")).unwrap().is_none());
    }

    #[test]
    fn unreachable_mirror_is_a_hard_error_and_not_cached() {
        let source = GitHubBuiltins::new(Some("1.27"))
            .with_base_url("http://127.0.0.1:1/")
            .with_timeout(Duration::from_millis(200));
        let gv = GroupVersion::new("", "v1");
        assert!(source.get(&gv).is_err());
        assert!(source.cache.is_empty());
    }
}
