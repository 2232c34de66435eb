//! Forwarding to the search backend
//!
//! Requests are replayed against the backend base URL with the same method
//! and the resolved path and query of a [`RequestTarget`]. Hop-by-hop headers and caller credentials are dropped;
//! the backend response comes back with its status, headers (minus
//! hop-by-hop) and body unchanged.

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::request::Parts;
use axum::response::Response;
use url::Url;

use super::error::GatewayError;
use super::policy::RequestTarget;
use crate::{Error, Result};

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Headers never forwarded in either direction
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// HTTP client for the search backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self> {
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "backend URL cannot be a base: {base_url}"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build backend client: {e}")))?;
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Backend URL for an inbound path and query
    #[must_use]
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!(
            "{}{}",
            self.base_url.as_str().trim_end_matches('/'),
            path_and_query
        )
    }

    /// Replay a request against the backend. `strip` names extra request
    /// headers to drop, such as the credential header.
    pub async fn forward(
        &self,
        parts: &Parts,
        target: &RequestTarget,
        body: Bytes,
        strip: &[HeaderName],
    ) -> std::result::Result<Response, GatewayError> {
        let target = self.target_url(target.as_str());

        tracing::debug!(
            method = %parts.method,
            target = %target,
            body_len = body.len(),
            "Forwarding request to backend"
        );

        let response = self
            .client
            .request(parts.method.clone(), &target)
            .headers(forwardable_headers(&parts.headers, strip))
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::BadGateway(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::BadGateway(e.to_string()))?;

        tracing::debug!(status = %status, body_len = body.len(), "Backend responded");

        let mut out = Response::new(Body::from(body));
        *out.status_mut() = status;
        for (name, value) in &headers {
            if !is_hop_by_hop(name) && *name != header::CONTENT_LENGTH {
                out.headers_mut().append(name.clone(), value.clone());
            }
        }
        Ok(out)
    }
}

/// Request headers safe to send to the backend
#[must_use]
pub fn forwardable_headers(headers: &HeaderMap, strip: &[HeaderName]) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if is_hop_by_hop(name)
            || *name == header::HOST
            || *name == header::CONTENT_LENGTH
            || *name == header::AUTHORIZATION
            || strip.contains(name)
        {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}
