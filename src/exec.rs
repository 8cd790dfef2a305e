//! Pass-through proxy to a remote run-code API.
//!
//! The proxy never runs code itself: it attaches the configured credentials,
//! forwards the script, and relays whatever JSON the upstream answers with.

use std::time::Duration;

use axum::http::{header, Method, Request, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};

use crate::config::ExecConfig;

pub const DEFAULT_VERSION_INDEX: &str = "0";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExecError {
    #[error("execution service timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("execution service unreachable: {0}")]
    Network(String),

    #[error("execution proxy is not configured")]
    NotConfigured,

    #[error("execution proxy failed: {0}")]
    Other(String),
}

impl ExecError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExecError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ExecError::Network(_) => StatusCode::BAD_GATEWAY,
            ExecError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ExecError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Body accepted by `POST /execute`. Required fields are optional here so a
/// missing one is reported with its name instead of a generic parse error.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    pub script: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stdin: String,
    #[serde(default, alias = "versionIndex")]
    pub version_index: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamPayload<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    script: &'a str,
    language: &'a str,
    version_index: &'a str,
    stdin: &'a str,
}

/// Upstream answer, relayed as-is.
#[derive(Debug)]
pub struct Relayed {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

#[derive(Clone)]
pub struct ExecProxy {
    client: HttpsClient,
    config: ExecConfig,
}

impl ExecProxy {
    pub fn new(config: ExecConfig) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(https);
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }

    pub async fn execute(&self, req: &ExecuteRequest) -> Result<Relayed, ExecError> {
        let (client_id, client_secret) = self.config.credentials().ok_or(ExecError::NotConfigured)?;
        let script = required(&req.script, "script")?;
        let language = required(&req.language, "language")?;

        let payload = UpstreamPayload {
            client_id,
            client_secret,
            script,
            language,
            version_index: req.version_index.as_deref().unwrap_or(DEFAULT_VERSION_INDEX),
            stdin: &req.stdin,
        };
        let body = serde_json::to_vec(&payload).map_err(|e| ExecError::Other(e.to_string()))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(&self.config.url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| ExecError::Other(format!("build request: {e}")))?;

        let timeout = self.config.timeout();
        tracing::info!(language, url = %self.config.url, "forwarding execution request");

        tokio::time::timeout(timeout, self.send(request))
            .await
            .map_err(|_| ExecError::Timeout(timeout))?
    }

    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Relayed, ExecError> {
        let resp: hyper::Response<hyper::body::Incoming> = self
            .client
            .request(request)
            .await
            .map_err(|e| ExecError::Network(e.to_string()))?;

        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ExecError::Network(format!("read response body: {e}")))?
            .to_bytes();

        let body = serde_json::from_slice(&bytes)
            .map_err(|e| ExecError::Other(format!("upstream returned non-JSON body ({status}): {e}")))?;

        tracing::debug!(%status, "execution service replied");
        Ok(Relayed { status, body })
    }
}

/// Field validation happens at the HTTP boundary; this keeps the proxy honest
/// when called directly.
fn required<'a>(field: &'a Option<String>, name: &str) -> Result<&'a str, ExecError> {
    match field.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ExecError::Other(format!("missing field `{name}`"))),
    }
}
