//! # Configuration Layering
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. a YAML file (`--config`, or `KVAL_CONFIG`);
//! 2. `KVAL_*` environment variables;
//! 3. command-line flags.
//!
//! `KUBECONFIG` is honored by the cluster source itself when no kubeconfig
//! is configured here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use kval_openapi::providers::KubeConfigOverrides;
use serde::Deserialize;

use crate::args::{OutputFormat, ValidateArgs};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Contents of the configuration file. Keys are spelled like the flags.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub version: Option<String>,
    pub local_schemas: Option<PathBuf>,
    pub local_crds: Option<PathBuf>,
    pub schema_patches: Option<PathBuf>,
    pub output: Option<OutputFormat>,
    pub kubeconfig: Option<PathBuf>,
    pub kube_context: Option<String>,
    pub kube_server: Option<String>,
    pub kube_insecure_skip_tls_verify: Option<bool>,
    pub github_base_url: Option<String>,
    pub timeout: Option<u64>,
    pub no_color: Option<bool>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub manifests: Vec<PathBuf>,
    pub kube_version: Option<String>,
    pub local_schemas: Option<PathBuf>,
    pub local_crds: Option<PathBuf>,
    pub schema_patches: Option<PathBuf>,
    pub output: OutputFormat,
    pub kube: KubeConfigOverrides,
    pub github_base_url: Option<String>,
    pub timeout: Duration,
    pub color: bool,
}

impl Settings {
    /// Layer the config file, the process environment and `args`.
    pub fn resolve(args: &ValidateArgs) -> Result<Self> {
        Self::resolve_with(args, |key| std::env::var(key).ok())
    }

    /// Like [`Settings::resolve`], reading the environment through `env`.
    pub fn resolve_with(args: &ValidateArgs, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_path = args
            .config
            .clone()
            .or_else(|| env("KVAL_CONFIG").map(PathBuf::from));
        let file = match &config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let env_output = env("KVAL_OUTPUT")
            .map(|raw| {
                raw.parse::<OutputFormat>()
                    .map_err(|e| anyhow::anyhow!("invalid KVAL_OUTPUT: {e}"))
            })
            .transpose()?;
        let env_timeout = env("KVAL_TIMEOUT_SECS")
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("invalid KVAL_TIMEOUT_SECS {raw:?}"))
            })
            .transpose()?;

        let path_layer = |flag: &Option<PathBuf>, var: &str, from_file: &Option<PathBuf>| {
            flag.clone()
                .or_else(|| env(var).map(PathBuf::from))
                .or_else(|| from_file.clone())
        };

        Ok(Self {
            manifests: args.manifests.clone(),
            kube_version: args
                .kube_version
                .clone()
                .or_else(|| env("KVAL_KUBE_VERSION"))
                .or(file.version),
            local_schemas: path_layer(&args.local_schemas, "KVAL_LOCAL_SCHEMAS", &file.local_schemas),
            local_crds: path_layer(&args.local_crds, "KVAL_LOCAL_CRDS", &file.local_crds),
            schema_patches: path_layer(&args.schema_patches, "KVAL_SCHEMA_PATCHES", &file.schema_patches),
            output: args.output.or(env_output).or(file.output).unwrap_or_default(),
            kube: KubeConfigOverrides {
                kubeconfig: args.kubeconfig.clone().or(file.kubeconfig),
                context: args.kube_context.clone().or(file.kube_context),
                server: args.kube_server.clone().or(file.kube_server),
                token: args.kube_token.clone(),
                insecure_skip_tls_verify: args.kube_insecure_skip_tls_verify
                    || file.kube_insecure_skip_tls_verify.unwrap_or(false),
            },
            github_base_url: args
                .github_base_url
                .clone()
                .or_else(|| env("KVAL_GITHUB_BASE_URL"))
                .or(file.github_base_url),
            timeout: args
                .timeout
                .or(env_timeout)
                .or(file.timeout)
                .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
            color: !(args.no_color || file.no_color.unwrap_or(false)),
        })
    }
}
