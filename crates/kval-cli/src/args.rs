//! Command-line arguments for `kval`.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Deserialize;

/// Report format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One status line per file; error messages on stderr.
    #[default]
    Human,
    /// One API `Status` per document, keyed by file path.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Everything except verbosity, which only affects logging.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Manifest files, or directories to search for `.yaml`, `.yml` and `.json` files.
    #[arg(required = true, value_name = "MANIFESTS")]
    pub manifests: Vec<PathBuf>,

    /// Kubernetes version whose builtin schemas to use (e.g. 1.27).
    #[arg(long = "version", value_name = "K8S_VERSION")]
    pub kube_version: Option<String>,

    /// Directory of OpenAPI documents laid out as `api/v1.json`, `apis/<group>/<version>.json`.
    #[arg(long, value_name = "DIR")]
    pub local_schemas: Option<PathBuf>,

    /// Directory of CustomResourceDefinition manifests.
    #[arg(long, value_name = "DIR")]
    pub local_crds: Option<PathBuf>,

    /// Directory of JSON patches applied to resolved schemas.
    #[arg(long, value_name = "DIR")]
    pub schema_patches: Option<PathBuf>,

    /// Report format.
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Kubeconfig used to fetch schemas from a live cluster.
    #[arg(long, value_name = "FILE")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use.
    #[arg(long, value_name = "NAME")]
    pub kube_context: Option<String>,

    /// API server URL, overriding the kubeconfig.
    #[arg(long, value_name = "URL")]
    pub kube_server: Option<String>,

    /// Bearer token, overriding the kubeconfig.
    #[arg(long, value_name = "TOKEN")]
    pub kube_token: Option<String>,

    /// Skip TLS certificate verification for the API server.
    #[arg(long)]
    pub kube_insecure_skip_tls_verify: bool,

    /// Mirror of `raw.githubusercontent.com/kubernetes/kubernetes` to fetch release schemas from.
    #[arg(long, value_name = "URL")]
    pub github_base_url: Option<String>,

    /// Timeout for remote schema requests, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,

    /// Path to a YAML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parses_case_insensitively() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("Human".parse::<OutputFormat>(), Ok(OutputFormat::Human));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
