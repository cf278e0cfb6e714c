//! OpenAPI documents laid out on disk like the API server's discovery
//! paths: `<dir>/api/v1.json`, `<dir>/apis/<group>/<version>.json`.

use std::path::PathBuf;

use kval_core::GroupVersion;

use crate::document::SchemaDocument;
use crate::error::SourceError;
use crate::source::SchemaSource;

const ORIGIN: &str = "local-schemas";

#[derive(Debug, Clone, Default)]
pub struct LocalSchemaFiles {
    dir: Option<PathBuf>,
}

impl LocalSchemaFiles {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

impl SchemaSource for LocalSchemaFiles {
    fn name(&self) -> &str {
        ORIGIN
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let Some(dir) = &self.dir else {
            return Ok(None);
        };
        let path = dir.join(format!("{}.json", gv.openapi_path()));
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|error| SourceError::Io {
            origin: ORIGIN.into(),
            path: path.clone(),
            error,
        })?;
        SchemaDocument::from_slice(&bytes)
            .map(Some)
            .map_err(|reason| SourceError::Parse {
                origin: ORIGIN.into(),
                location: path.display().to_string(),
                reason,
            })
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_core_and_group_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("apis/apps")).unwrap();
        std::fs::create_dir_all(dir.path().join("api")).unwrap();
        std::fs::write(dir.path().join("api/v1.json"), r#"{"openapi": "3.0.0"}"#).unwrap();
        std::fs::write(dir.path().join("apis/apps/v1.json"), r#"{"openapi": "3.0.1"}"#).unwrap();

        let source = LocalSchemaFiles::new(Some(dir.path().to_path_buf()));
        source.check().unwrap();
        let core = source.get(&GroupVersion::new("", "v1")).unwrap().unwrap();
        assert_eq!(core.as_value()["openapi"], "3.0.0");
        let apps = source.get(&GroupVersion::new("apps", "v1")).unwrap().unwrap();
        assert_eq!(apps.as_value()["openapi"], "3.0.1");
        assert!(source.get(&GroupVersion::new("batch", "v1")).unwrap().is_none());
    }

    #[test]
    fn unparsable_document_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("api")).unwrap();
        std::fs::write(dir.path().join("api/v1.json"), "{ not json").unwrap();
        let source = LocalSchemaFiles::new(Some(dir.path().to_path_buf()));
        assert!(matches!(
            source.get(&GroupVersion::new("", "v1")),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn unconfigured_or_missing_directory() {
        let gv = GroupVersion::new("", "v1");
        assert!(LocalSchemaFiles::default().get(&gv).unwrap().is_none());
        let missing = LocalSchemaFiles::new(Some("/nonexistent/kval-schemas".into()));
        assert!(matches!(
            missing.check(),
            Err(SourceError::MissingDirectory { .. })
        ));
    }
}
