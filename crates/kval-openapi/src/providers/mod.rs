//! # Schema Providers
//!
//! Leaf [`SchemaSource`](crate::SchemaSource) implementations. Each one
//! owns its transport (filesystem, binary, HTTP) and reports "not found"
//! whenever it is unconfigured.

mod builtins;
mod cluster;
mod github;
pub mod kubeconfig;
mod local_crds;
mod local_schemas;

pub use builtins::EmbeddedBuiltins;
pub use cluster::ClusterSource;
pub use github::GitHubBuiltins;
pub use kubeconfig::KubeConfigOverrides;
pub use local_crds::LocalCrdFiles;
pub use local_schemas::LocalSchemaFiles;
