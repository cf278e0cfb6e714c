//! # Live Cluster Schemas
//!
//! Queries the API server named by the kubeconfig. `/openapi/v3` lists
//! every group-version path with a `serverRelativeURL`; the document for a
//! group-version is fetched from that URL.
//!
//! Connection setup and discovery run once. If either fails, the source
//! reports itself unavailable for the rest of the run instead of retrying
//! an unreachable server on every lookup.

use std::collections::BTreeMap;
use std::time::Duration;

use kval_core::{GroupVersion, OnceMap};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::kubeconfig::{self, ClusterTarget, KubeConfigOverrides};
use crate::document::SchemaDocument;
use crate::error::SourceError;
use crate::http::{build_client, fetch_json, ClientOptions};
use crate::source::SchemaSource;

const ORIGIN: &str = "cluster";
const DISCOVERY_PATH: &str = "/openapi/v3";

#[derive(Debug)]
struct Connection {
    server: String,
    client: Client,
}

/// Discovery path (`apis/apps/v1`) → server-relative document URL.
type Discovery = BTreeMap<String, String>;

#[derive(Debug)]
pub struct ClusterSource {
    overrides: KubeConfigOverrides,
    timeout: Option<Duration>,
    connection: OnceCell<Result<Option<Connection>, String>>,
    discovery: OnceCell<Result<Discovery, String>>,
    cache: OnceMap<GroupVersion, Option<SchemaDocument>>,
}

impl ClusterSource {
    pub fn new(overrides: KubeConfigOverrides) -> Self {
        Self {
            overrides,
            timeout: None,
            connection: OnceCell::new(),
            discovery: OnceCell::new(),
            cache: OnceMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn unavailable(reason: &str) -> SourceError {
        SourceError::Unavailable {
            origin: ORIGIN.into(),
            reason: reason.to_string(),
        }
    }

    fn connect(&self) -> Result<Option<Connection>, SourceError> {
        let Some(target) = kubeconfig::resolve(&self.overrides)? else {
            debug!(origin = ORIGIN, "no kubeconfig or server configured, cluster source disabled");
            return Ok(None);
        };
        self.connect_to(&target).map(Some)
    }

    fn connect_to(&self, target: &ClusterTarget) -> Result<Connection, SourceError> {
        let client = build_client(
            ORIGIN,
            ClientOptions {
                timeout: self.timeout,
                ca_pem: target.ca_pem.as_deref(),
                identity_pem: target.identity_pem.as_deref(),
                bearer_token: target.token.as_deref(),
                insecure_skip_tls_verify: target.insecure_skip_tls_verify,
            },
        )?;
        Ok(Connection {
            server: target.server.clone(),
            client,
        })
    }

    fn connection(&self) -> Result<Option<&Connection>, SourceError> {
        let state = self.connection.get_or_init(|| {
            self.connect().map_err(|e| {
                warn!(origin = ORIGIN, "cluster source unavailable: {e}");
                e.to_string()
            })
        });
        match state {
            Ok(conn) => Ok(conn.as_ref()),
            Err(reason) => Err(Self::unavailable(reason)),
        }
    }

    fn discovery(&self, conn: &Connection) -> Result<&Discovery, SourceError> {
        let state = self.discovery.get_or_init(|| {
            let url = format!("{}{DISCOVERY_PATH}", conn.server);
            let fetched = fetch_json(&conn.client, ORIGIN, &url).and_then(|body| {
                body.map(|b| parse_discovery(&b)).ok_or_else(|| SourceError::Status {
                    origin: ORIGIN.into(),
                    url: url.clone(),
                    status: 404,
                })
            });
            fetched.map_err(|e| {
                warn!(origin = ORIGIN, "OpenAPI v3 discovery failed: {e}");
                e.to_string()
            })
        });
        state.as_ref().map_err(|reason| Self::unavailable(reason))
    }
}

fn parse_discovery(body: &Value) -> Discovery {
    body.get("paths")
        .and_then(Value::as_object)
        .map(|paths| {
            paths
                .iter()
                .filter_map(|(path, entry)| {
                    let url = entry.get("serverRelativeURL")?.as_str()?;
                    Some((path.clone(), url.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

impl SchemaSource for ClusterSource {
    fn name(&self) -> &str {
        ORIGIN
    }

    fn get(&self, gv: &GroupVersion) -> Result<Option<SchemaDocument>, SourceError> {
        let Some(conn) = self.connection()? else {
            return Ok(None);
        };
        let discovery = self.discovery(conn)?;
        let Some(relative) = discovery.get(&gv.openapi_path()) else {
            debug!(origin = ORIGIN, group_version = %gv, "group-version not served by cluster");
            return Ok(None);
        };
        self.cache.get_or_try_init(gv, || {
            let url = format!("{}{relative}", conn.server);
            let Some(value) = fetch_json(&conn.client, ORIGIN, &url)? else {
                return Ok(None);
            };
            SchemaDocument::from_value(value)
                .map(Some)
                .ok_or_else(|| SourceError::Parse {
                    origin: ORIGIN.into(),
                    location: url,
                    reason: "document root is not an object".into(),
                })
        })
    }
}
