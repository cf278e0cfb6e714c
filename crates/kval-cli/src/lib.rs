//! # kval-cli: The `kval` Command
//!
//! ```bash
//! kval --version 1.27 deploy/
//! kval --local-crds crds/ -o json widgets.yaml
//! kval --kubeconfig ~/.kube/config --kube-context staging manifests/
//! ```
//!
//! Exit codes: `0` when every document passes, `1` when any document
//! fails, `2` when the run itself fails (bad configuration, unusable
//! schema sources).

pub mod args;
pub mod chain;
pub mod config;
pub mod discover;
pub mod run;

pub use args::{OutputFormat, ValidateArgs};
pub use config::Settings;
pub use run::{run, EXIT_ERROR, EXIT_INVALID, EXIT_OK};
