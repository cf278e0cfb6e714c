//! The schema source capability.

use std::fmt::Debug;

use kval_core::GroupVersion;

use crate::document::SchemaDocument;
use crate::error::SourceError;

/// Provider of OpenAPI documents keyed by group-version.
///
/// `Ok(None)` means the source does not know the group-version; `Err` is a
/// hard failure (unreadable file, network error, broken patch). Combinators
/// decide how each is propagated.
pub trait SchemaSource: Debug + Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &str;

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError>;

    /// Validate configuration once, before the first lookup.
    fn check(&self) -> Result<(), SourceError> {
        Ok(())
    }
}

impl<S: SchemaSource + ?Sized> SchemaSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        (**self).get(gv)
    }

    fn check(&self) -> Result<(), SourceError> {
        (**self).check()
    }
}

/// Canned sources for combinator tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[derive(Debug)]
    pub enum Canned {
        Found(SchemaDocument),
        NotFound,
        Fails(&'static str),
    }

    #[derive(Debug)]
    pub struct StaticSource {
        pub answer: Canned,
        pub calls: AtomicUsize,
    }

    impl StaticSource {
        pub fn boxed(answer: Canned) -> Box<dyn SchemaSource> {
            Box::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl SchemaSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        fn get(&self, _gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Canned::Found(doc) => Ok(Some(doc.clone())),
                Canned::NotFound => Ok(None),
                Canned::Fails(reason) => Err(SourceError::Config {
                    origin: "static".into(),
                    reason: (*reason).to_string(),
                }),
            }
        }
    }

    /// A document with a single component carrying `marker` as description.
    pub fn doc(marker: &str) -> SchemaDocument {
        let mut doc = SchemaDocument::empty();
        doc.insert_schema(marker, json!({ "description": marker }));
        doc
    }

    pub fn gv() -> GroupVersion {
        GroupVersion::new("", "v1")
    }
}
