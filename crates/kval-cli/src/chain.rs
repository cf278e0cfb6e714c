//! Assembles the schema source chain from resolved settings.
//!
//! ```text
//! Overlay(patches from --schema-patches,
//!   Composite(
//!     local OpenAPI documents,
//!     local CRDs,
//!     Overlay(embedded patches,
//!       Fallback(
//!         live cluster,
//!         Fallback(GitHub release documents, embedded builtins)))))
//! ```
//!
//! Earlier entries take precedence. The embedded builtins are a partial
//! snapshot, so the complete release documents are preferred whenever they
//! can be fetched.

use kval_openapi::providers::{
    ClusterSource, EmbeddedBuiltins, GitHubBuiltins, LocalCrdFiles, LocalSchemaFiles,
};
use kval_openapi::{Composite, DirectoryPatchLoader, EmbeddedPatchLoader, Fallback, Overlay, SchemaSource};

use crate::config::Settings;

pub fn build_source(settings: &Settings) -> Box<dyn SchemaSource> {
    let version = settings.kube_version.as_deref();

    let mut github = GitHubBuiltins::new(version).with_timeout(settings.timeout);
    if let Some(base_url) = &settings.github_base_url {
        github = github.with_base_url(base_url.as_str());
    }
    let builtins = Fallback::new(vec![
        Box::new(github),
        Box::new(EmbeddedBuiltins::new(version)),
    ]);
    let remote = Fallback::new(vec![
        Box::new(ClusterSource::new(settings.kube.clone()).with_timeout(settings.timeout)),
        Box::new(builtins),
    ]);
    let patched_remote = Overlay::new(
        Box::new(EmbeddedPatchLoader::new(version)),
        Box::new(remote),
    );

    Box::new(Overlay::new(
        Box::new(DirectoryPatchLoader::new(settings.schema_patches.clone())),
        Box::new(Composite::new(vec![
            Box::new(LocalSchemaFiles::new(settings.local_schemas.clone())),
            Box::new(LocalCrdFiles::new(settings.local_crds.clone())),
            Box::new(patched_remote),
        ])),
    ))
}
