//! Blocking HTTP plumbing shared by the remote providers.
//!
//! Retries only on connection failures. Timeouts and HTTP error statuses are
//! returned immediately; the enclosing `Fallback` decides what to do next.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::SourceError;

/// Retry attempts after the initial request.
const MAX_RETRIES: u32 = 2;

/// Base delay between retries (doubles each attempt: 200ms, 400ms).
const BASE_DELAY_MS: u64 = 200;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("kval/", env!("CARGO_PKG_VERSION"));

fn retry_send<F>(send: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Result<Response, reqwest::Error>,
{
    for attempt in 0..MAX_RETRIES {
        match send() {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_connect() => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::debug!(
                    attempt = attempt + 1,
                    max_retries = MAX_RETRIES,
                    "schema request failed to connect, retrying in {delay:?}: {e}"
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
    send()
}

/// TLS and auth settings for a client.
#[derive(Default)]
pub(crate) struct ClientOptions<'a> {
    pub timeout: Option<Duration>,
    pub ca_pem: Option<&'a [u8]>,
    pub identity_pem: Option<&'a [u8]>,
    pub bearer_token: Option<&'a str>,
    pub insecure_skip_tls_verify: bool,
}

pub(crate) fn build_client(origin: &str, options: ClientOptions<'_>) -> Result<Client, SourceError> {
    let config_error = |reason: String| SourceError::Config {
        origin: origin.to_string(),
        reason,
    };

    let mut builder = Client::builder()
        .timeout(options.timeout.unwrap_or(DEFAULT_TIMEOUT))
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(options.insecure_skip_tls_verify);

    if let Some(pem) = options.ca_pem {
        let cert = reqwest::Certificate::from_pem(pem)
            .map_err(|e| config_error(format!("invalid certificate authority: {e}")))?;
        builder = builder.add_root_certificate(cert);
    }
    if let Some(pem) = options.identity_pem {
        let identity = reqwest::Identity::from_pem(pem)
            .map_err(|e| config_error(format!("invalid client certificate: {e}")))?;
        builder = builder.identity(identity);
    }
    if let Some(token) = options.bearer_token {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| config_error(format!("invalid bearer token: {e}")))?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        builder = builder.default_headers(headers);
    }

    builder
        .build()
        .map_err(|e| config_error(format!("failed to build HTTP client: {e}")))
}

/// GET `url` and decode a JSON body. 404 is `Ok(None)`.
pub(crate) fn fetch_json(client: &Client, origin: &str, url: &str) -> Result<Option<Value>, SourceError> {
    let http_error = |error| SourceError::Http {
        origin: origin.to_string(),
        url: url.to_string(),
        error,
    };

    let response = retry_send(|| client.get(url).send()).map_err(http_error)?;
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            origin: origin.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response.bytes().map_err(http_error)?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| SourceError::Parse {
            origin: origin.to_string(),
            location: url.to_string(),
            reason: e.to_string(),
        })
}
