//! # Kubeconfig Resolution
//!
//! Reads just enough of a kubeconfig to reach one API server: the selected
//! context, its cluster (server URL, CA, TLS verification) and its user
//! (bearer token or client certificate). Command-line overrides win over
//! file contents.
//!
//! Lookup order for the file: explicit path, the first entry of
//! `KUBECONFIG`, then `~/.kube/config`.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::Deserialize;

use crate::error::SourceError;

const ORIGIN: &str = "kubeconfig";

/// Connection settings supplied on the command line.
#[derive(Clone, Default)]
pub struct KubeConfigOverrides {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub server: Option<String>,
    pub token: Option<String>,
    pub insecure_skip_tls_verify: bool,
}

impl fmt::Debug for KubeConfigOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeConfigOverrides")
            .field("kubeconfig", &self.kubeconfig)
            .field("context", &self.context)
            .field("server", &self.server)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

/// Everything needed to build an HTTP client for one API server.
#[derive(Clone, Default)]
pub struct ClusterTarget {
    pub server: String,
    pub token: Option<String>,
    pub ca_pem: Option<Vec<u8>>,
    pub identity_pem: Option<Vec<u8>>,
    pub insecure_skip_tls_verify: bool,
}

impl fmt::Debug for ClusterTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterTarget")
            .field("server", &self.server)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("ca_pem", &self.ca_pem.as_ref().map(Vec::len))
            .field("identity_pem", &self.identity_pem.as_ref().map(|_| "[REDACTED]"))
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct KubeConfig {
    #[serde(default)]
    clusters: Vec<NamedCluster>,
    #[serde(default)]
    contexts: Vec<NamedContext>,
    #[serde(default)]
    users: Vec<NamedUser>,
    #[serde(default)]
    current_context: String,
}

#[derive(Debug, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Cluster {
    #[serde(default)]
    server: String,
    certificate_authority: Option<PathBuf>,
    certificate_authority_data: Option<String>,
    #[serde(default)]
    insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
struct NamedContext {
    name: String,
    context: Context,
}

#[derive(Debug, Deserialize)]
struct Context {
    cluster: String,
    #[serde(default)]
    user: String,
}

#[derive(Debug, Deserialize)]
struct NamedUser {
    name: String,
    #[serde(default)]
    user: AuthInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AuthInfo {
    token: Option<String>,
    #[serde(rename = "tokenFile")]
    token_file: Option<PathBuf>,
    client_certificate: Option<PathBuf>,
    client_certificate_data: Option<String>,
    client_key: Option<PathBuf>,
    client_key_data: Option<String>,
}

fn config_error(reason: impl Into<String>) -> SourceError {
    SourceError::Config {
        origin: ORIGIN.into(),
        reason: reason.into(),
    }
}

/// Pick the kubeconfig file.
///
/// An explicit path is returned even if missing so the caller can report
/// it; implicit locations are only returned when they exist.
pub fn locate(explicit: Option<&Path>, env: Option<OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(env) = env {
        if let Some(first) = std::env::split_paths(&env).find(|p| !p.as_os_str().is_empty()) {
            return Some(first);
        }
    }
    home.map(|h| h.join(".kube").join("config"))
        .filter(|p| p.is_file())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Resolve the target server from the environment's kubeconfig.
pub fn resolve(overrides: &KubeConfigOverrides) -> Result<Option<ClusterTarget>, SourceError> {
    let path = locate(
        overrides.kubeconfig.as_deref(),
        std::env::var_os("KUBECONFIG"),
        home_dir(),
    );
    resolve_from(overrides, path.as_deref())
}

/// Resolve the target server from a specific kubeconfig (or none).
///
/// Returns `Ok(None)` when there is nothing to connect to: no file, no
/// current context, and no server override.
pub fn resolve_from(
    overrides: &KubeConfigOverrides,
    path: Option<&Path>,
) -> Result<Option<ClusterTarget>, SourceError> {
    let config = match path {
        Some(path) => load(path)?,
        None => KubeConfig::default(),
    };
    let base_dir = path.and_then(Path::parent).unwrap_or(Path::new("."));

    let context_name = overrides
        .context
        .clone()
        .unwrap_or_else(|| config.current_context.clone());

    let (cluster, user) = if context_name.is_empty() {
        (None, None)
    } else {
        let context = config
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .ok_or_else(|| config_error(format!("context {context_name:?} not found")))?;
        let cluster = config
            .clusters
            .iter()
            .find(|c| c.name == context.context.cluster)
            .ok_or_else(|| config_error(format!("cluster {:?} not found", context.context.cluster)))?;
        let user = config.users.iter().find(|u| u.name == context.context.user);
        (Some(&cluster.cluster), user.map(|u| &u.user))
    };

    let server = match (&overrides.server, cluster) {
        (Some(server), _) => server.clone(),
        (None, Some(cluster)) if !cluster.server.is_empty() => cluster.server.clone(),
        (None, Some(_)) => return Err(config_error(format!("context {context_name:?} has no server"))),
        (None, None) => return Ok(None),
    };

    let server = server.trim_end_matches('/').to_string();
    url::Url::parse(&server).map_err(|e| config_error(format!("invalid server URL {server:?}: {e}")))?;

    let mut target = ClusterTarget {
        server,
        insecure_skip_tls_verify: overrides.insecure_skip_tls_verify,
        ..ClusterTarget::default()
    };

    if let Some(cluster) = cluster {
        target.insecure_skip_tls_verify |= cluster.insecure_skip_tls_verify;
        target.ca_pem = inline_or_file(
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base_dir,
        )?;
    }

    target.token = match (&overrides.token, user) {
        (Some(token), _) => Some(token.clone()),
        (None, Some(user)) => match (&user.token, &user.token_file) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(file)) => Some(read(&base_dir.join(file))?.trim().to_string()),
            (None, None) => None,
        },
        (None, None) => None,
    };

    if let Some(user) = user {
        let cert = inline_or_file(
            user.client_certificate_data.as_deref(),
            user.client_certificate.as_deref(),
            base_dir,
        )?;
        let key = inline_or_file(user.client_key_data.as_deref(), user.client_key.as_deref(), base_dir)?;
        if let (Some(mut cert), Some(key)) = (cert, key) {
            cert.push(b'\n');
            cert.extend_from_slice(&key);
            target.identity_pem = Some(cert);
        }
    }

    Ok(Some(target))
}

fn load(path: &Path) -> Result<KubeConfig, SourceError> {
    let text = read(path)?;
    serde_yaml::from_str(&text).map_err(|e| SourceError::Parse {
        origin: ORIGIN.into(),
        location: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn read(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|error| SourceError::Io {
        origin: ORIGIN.into(),
        path: path.to_path_buf(),
        error,
    })
}

/// Base64 `*-data` wins over a file reference.
fn inline_or_file(data: Option<&str>, file: Option<&Path>, base_dir: &Path) -> Result<Option<Vec<u8>>, SourceError> {
    if let Some(data) = data {
        return base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map(Some)
            .map_err(|e| config_error(format!("invalid base64 data: {e}")));
    }
    match file {
        Some(file) => read(&base_dir.join(file)).map(|s| Some(s.into_bytes())),
        None => Ok(None),
    }
}
