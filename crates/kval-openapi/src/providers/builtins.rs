//! Builtin API documents shipped inside the binary.
//!
//! The snapshots cover the commonly used core kinds and are meant as the
//! offline fallback behind the complete release documents.

use kval_core::GroupVersion;

use crate::document::SchemaDocument;
use crate::embedded;
use crate::error::SourceError;
use crate::source::SchemaSource;

const ORIGIN: &str = "embedded-builtins";

#[derive(Debug, Clone, Default)]
pub struct EmbeddedBuiltins {
    version: Option<String>,
}

impl EmbeddedBuiltins {
    /// `version` is a Kubernetes release (`1.27`, `v1.27.3`, ...).
    pub fn new(version: Option<&str>) -> Self {
        Self {
            version: version.and_then(embedded::normalize_version),
        }
    }
}

impl SchemaSource for EmbeddedBuiltins {
    fn name(&self) -> &str {
        ORIGIN
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let Some(version) = &self.version else {
            return Ok(None);
        };
        let path = gv.openapi_path();
        let Some(text) = embedded::schema(version, &path) else {
            return Ok(None);
        };
        SchemaDocument::from_slice(text.as_bytes())
            .map(Some)
            .map_err(|reason| SourceError::Parse {
                origin: ORIGIN.into(),
                location: format!("{version}/{path}"),
                reason,
            })
    }
}
