//! HTTP-facing failure taxonomy

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Terminal, non-forwarding outcomes of a request.
///
/// Bodies are fixed strings; the cause is logged, never returned.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("forbidden")]
    Forbidden,

    #[error("upstream failure")]
    UpstreamFailure,

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("unsupported request target: {0}")]
    InvalidTarget(String),
}

impl GatewayError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::UpstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyRead(_) | Self::InvalidTarget(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short, stable label for logs and metrics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "rejected",
            Self::Forbidden => "forbidden",
            Self::UpstreamFailure => "upstream_failed",
            Self::BadGateway(_) => "bad_gateway",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::BodyRead(_) => "body_read",
            Self::InvalidTarget(_) => "invalid_target",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication failed",
            Self::Forbidden => "forbidden",
            Self::UpstreamFailure => "tenant lookup failed",
            Self::BadGateway(_) => "search backend unavailable",
            Self::PayloadTooLarge { .. } => "request body too large",
            Self::BodyRead(_) => "unreadable request body",
            Self::InvalidTarget(_) => "unsupported request target",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.public_message() });
        (self.status(), Json(body)).into_response()
    }
}
