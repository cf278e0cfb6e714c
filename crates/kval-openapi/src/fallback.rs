//! # Fallback Resolution
//!
//! Tries each source in order and returns the first document found. Hard
//! errors do not stop the search: a later source may still answer. When no
//! source finds the document, the first hard error is returned so that the
//! most preferred source's failure is the one the user sees.

use kval_core::GroupVersion;
use tracing::debug;

use crate::document::SchemaDocument;
use crate::error::SourceError;
use crate::source::SchemaSource;

#[derive(Debug)]
pub struct Fallback {
    sources: Vec<Box<dyn SchemaSource>>,
}

impl Fallback {
    pub fn new(sources: Vec<Box<dyn SchemaSource>>) -> Self {
        Self { sources }
    }
}

impl SchemaSource for Fallback {
    fn name(&self) -> &str {
        "fallback"
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let mut first_error = None;
        for source in &self.sources {
            match source.get(gv) {
                Ok(Some(doc)) => {
                    debug!(source = source.name(), group_version = %gv, "schema found");
                    return Ok(Some(doc));
                }
                Ok(None) => {
                    debug!(source = source.name(), group_version = %gv, "schema not found, trying next source");
                }
                Err(error) => {
                    debug!(source = source.name(), group_version = %gv, %error, "source failed, trying next source");
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.sources.is_empty() {
            return Err(SourceError::EmptyComposition {
                combinator: self.name().to_string(),
            });
        }
        self.sources.iter().try_for_each(|source| source.check())
    }
}
