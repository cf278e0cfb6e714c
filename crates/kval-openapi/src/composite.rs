//! # Composite Resolution
//!
//! Queries every source and merges what they return. Earlier sources take
//! precedence: on a colliding component or path key the first document to
//! define it wins. A failing member does not block the others: its error
//! is returned only when no member found a document.

use kval_core::GroupVersion;
use tracing::debug;

use crate::document::SchemaDocument;
use crate::error::SourceError;
use crate::source::SchemaSource;

#[derive(Debug)]
pub struct Composite {
    sources: Vec<Box<dyn SchemaSource>>,
}

impl Composite {
    pub fn new(sources: Vec<Box<dyn SchemaSource>>) -> Self {
        Self { sources }
    }
}

impl SchemaSource for Composite {
    fn name(&self) -> &str {
        "composite"
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let mut merged: Option<SchemaDocument> = None;
        let mut first_error = None;
        for source in &self.sources {
            let doc = match source.get(gv) {
                Ok(Some(doc)) => doc,
                Ok(None) => continue,
                Err(error) => {
                    debug!(source = source.name(), group_version = %gv, %error, "source failed, merging the others");
                    first_error.get_or_insert(error);
                    continue;
                }
            };
            debug!(source = source.name(), group_version = %gv, "merging schema document");
            match merged.as_mut() {
                Some(existing) => existing.merge_from(&doc),
                None => merged = Some(doc),
            }
        }
        match (merged, first_error) {
            (Some(doc), _) => Ok(Some(doc)),
            (None, Some(error)) => Err(error),
            (None, None) => Ok(None),
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

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::source::testing::{doc, gv, Canned, StaticSource};

    #[test]
    fn colliding_keys_resolve_to_first_source() {
        let mut first = SchemaDocument::empty();
        first.insert_schema("shared", json!({ "description": "first" }));
        let mut second = SchemaDocument::empty();
        second.insert_schema("shared", json!({ "description": "second" }));
        second.insert_schema("extra", json!({ "description": "extra" }));

        let composite = Composite::new(vec![
            StaticSource::boxed(Canned::Found(first)),
            StaticSource::boxed(Canned::Found(second)),
        ]);
        let merged = composite.get(&gv()).unwrap().unwrap();
        assert_eq!(merged.schema("shared").unwrap()["description"], "first");
        assert_eq!(merged.schema("extra").unwrap()["description"], "extra");
    }

    #[test]
    fn not_found_members_are_ignored() {
        let composite = Composite::new(vec![
            StaticSource::boxed(Canned::NotFound),
            StaticSource::boxed(Canned::Found(doc("a"))),
            StaticSource::boxed(Canned::NotFound),
        ]);
        assert!(composite.get(&gv()).unwrap().unwrap().schema("a").is_some());
    }

    #[test]
    fn all_not_found_is_not_found() {
        let composite = Composite::new(vec![StaticSource::boxed(Canned::NotFound)]);
        assert!(composite.get(&gv()).unwrap().is_none());
    }

    #[test]
    fn failing_member_does_not_hide_found_documents() {
        let composite = Composite::new(vec![
            StaticSource::boxed(Canned::Found(doc("a"))),
            StaticSource::boxed(Canned::Fails("broken")),
        ]);
        assert!(composite.get(&gv()).unwrap().unwrap().schema("a").is_some());

        let composite = Composite::new(vec![
            StaticSource::boxed(Canned::Fails("broken")),
            StaticSource::boxed(Canned::Found(doc("b"))),
        ]);
        assert!(composite.get(&gv()).unwrap().unwrap().schema("b").is_some());
    }

    #[test]
    fn member_error_propagates_when_nothing_found() {
        let composite = Composite::new(vec![
            StaticSource::boxed(Canned::NotFound),
            StaticSource::boxed(Canned::Fails("first")),
            StaticSource::boxed(Canned::Fails("second")),
        ]);
        let error = composite.get(&gv()).unwrap_err();
        assert!(error.to_string().contains("first"), "{error}");
    }

    #[test]
    fn check_recurses_into_members() {
        let composite = Composite::new(vec![Box::new(Composite::new(Vec::new()))]);
        assert!(matches!(
            composite.check(),
            Err(SourceError::EmptyComposition { .. })
        ));
    }
}
