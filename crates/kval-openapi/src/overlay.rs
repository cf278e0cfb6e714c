//! # Patch Overlay
//!
//! Applies a group-version's schema patch on top of whatever the base source
//! resolves. Used to correct known gaps in published schemas (for example
//! the missing `maxLength` on `ObjectMeta.name`).

use kval_core::GroupVersion;
use tracing::debug;

use crate::document::SchemaDocument;
use crate::error::SourceError;
use crate::patch::PatchLoader;
use crate::source::SchemaSource;

#[derive(Debug)]
pub struct Overlay {
    patches: Box<dyn PatchLoader>,
    base: Box<dyn SchemaSource>,
}

impl Overlay {
    pub fn new(patches: Box<dyn PatchLoader>, base: Box<dyn SchemaSource>) -> Self {
        Self { patches, base }
    }
}

impl SchemaSource for Overlay {
    fn name(&self) -> &str {
        "overlay"
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let Some(mut doc) = self.base.get(gv)? else {
            return Ok(None);
        };
        if let Some(patch) = self.patches.load(gv)? {
            debug!(group_version = %gv, operations = patch.len(), "applying schema patch");
            patch
                .apply(doc.value_mut())
                .map_err(|error| SourceError::Patch {
                    group_version: gv.to_string(),
                    error,
                })?;
        }
        Ok(Some(doc))
    }

    fn check(&self) -> Result<(), SourceError> {
        self.patches.check()?;
        self.base.check()
    }
}
