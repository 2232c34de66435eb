//! Per-request orchestration
//!
//! Every path and method lands in [`handle`]. The request target is
//! resolved first (see [`RequestTarget`]); every later decision and the
//! forwarded URL use that resolved path.
//!
//! 1. A valid admin Basic credential forwards the request unscoped.
//! 2. No token: a failed Basic credential is rejected, otherwise the fixed
//!    probe body is returned and nothing is forwarded.
//! 3. The token is verified (`401` on any failure).
//! 4. Administrative paths are refused (`403`).
//! 5. The tenant record is resolved (`500` on any failure).
//! 6. Search submissions are rewritten, then the request is forwarded.

use std::borrow::Cow;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use super::error::GatewayError;
use super::policy::RequestTarget;
use super::state::GatewayState;
use crate::auth::{AuthError, is_basic};

/// Body returned to callers that present no credential at all
#[derive(Debug, Serialize)]
struct ProbeResponse {
    status: &'static str,
    authenticated: bool,
}

const PROBE: ProbeResponse = ProbeResponse {
    status: "ok",
    authenticated: false,
};

/// Build the gateway router: every request goes through [`handle`].
pub fn router(state: GatewayState) -> Router {
    metrics_routes(Router::new())
        .fallback(handle)
        .with_state(state)
}

#[cfg(feature = "metrics")]
fn metrics_routes(app: Router<GatewayState>) -> Router<GatewayState> {
    app.route(
        "/_gateway/metrics",
        axum::routing::get(super::metrics_handler),
    )
}

#[cfg(not(feature = "metrics"))]
const fn metrics_routes(app: Router<GatewayState>) -> Router<GatewayState> {
    app
}

/// Fallback handler for all inbound requests
pub async fn handle(State(state): State<GatewayState>, request: Request) -> Response {
    let (response, outcome) = match process(&state, request).await {
        Ok((response, outcome)) => (response, outcome),
        Err(err) => {
            let outcome = err.label();
            (err.into_response(), outcome)
        }
    };

    #[cfg(feature = "metrics")]
    crate::observability::record_request(outcome);
    tracing::trace!(outcome, status = %response.status(), "Request finished");

    response
}

async fn process(
    state: &GatewayState,
    request: Request,
) -> Result<(Response, &'static str), GatewayError> {
    let (parts, body) = request.into_parts();

    let raw_target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let target = RequestTarget::parse(raw_target).ok_or_else(|| {
        tracing::warn!(request_target = raw_target, "Unsupported request target");
        GatewayError::InvalidTarget(raw_target.to_string())
    })?;

    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if let (Some(admin), Some(authorization)) = (state.admin(), authorization)
        && admin.verify_basic_header(authorization)
    {
        tracing::info!(
            admin = admin.username(),
            method = %parts.method,
            path = target.path(),
            "Admin bypass, forwarding unscoped"
        );
        let body = read_body(body, state.body_limit()).await?;
        let response = forward(state, &parts, &target, body).await?;
        return Ok((response, "admin_bypass"));
    }

    let token = parts
        .headers
        .get(state.credential_header())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        if authorization.is_some_and(is_basic) {
            tracing::warn!(path = target.path(), "Basic credential rejected");
            return Err(GatewayError::AuthenticationFailed);
        }
        return Ok((Json(PROBE).into_response(), "probe"));
    };

    let claims = state.verifier().verify(token).map_err(|e| {
        log_rejection(&e);
        #[cfg(feature = "metrics")]
        crate::observability::record_auth_failure(e.reason());
        GatewayError::AuthenticationFailed
    })?;

    tracing::info!(
        principal = %claims.email,
        issuer = %claims.issuer,
        method = %parts.method,
        path = target.path(),
        "Caller authenticated"
    );

    if state.policy().is_blocked(target.path()) {
        tracing::warn!(
            principal = %claims.email,
            path = target.path(),
            "Blocked administrative path"
        );
        return Err(GatewayError::Forbidden);
    }

    let record = state
        .tenants()
        .lookup(token, &claims.email)
        .await
        .map_err(|e| {
            tracing::warn!(
                principal = %claims.email,
                reason = e.reason(),
                error = %e,
                "Tenant lookup failed"
            );
            GatewayError::UpstreamFailure
        })?;

    let mut body = read_body(body, state.body_limit()).await?;

    if state.policy().is_search(&parts.method, target.path()) {
        let rewrite = state.rewriter().rewrite(&body, &record);
        let outcome = rewrite.outcome;
        let rewritten = match rewrite.body {
            Cow::Owned(bytes) => Some(bytes),
            Cow::Borrowed(_) => None,
        };

        tracing::debug!(
            principal = %claims.email,
            outcome = outcome.label(),
            "Search body processed"
        );
        #[cfg(feature = "metrics")]
        crate::observability::record_rewrite(outcome.label());

        if let Some(bytes) = rewritten {
            body = Bytes::from(bytes);
        }
    }

    let response = forward(state, &parts, &target, body).await?;
    Ok((response, "forwarded"))
}

async fn forward(
    state: &GatewayState,
    parts: &Parts,
    target: &RequestTarget,
    body: Bytes,
) -> Result<Response, GatewayError> {
    let strip = [state.credential_header().clone()];
    state
        .backend()
        .forward(parts, target, body, &strip)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Backend request failed"))
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.is::<http_body_util::LengthLimitError>() {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::BodyRead(inner.to_string())
        }
    })
}

fn log_rejection(err: &AuthError) {
    match err {
        AuthError::TokenExpired | AuthError::TokenNotYetValid | AuthError::MalformedToken(_) => {
            tracing::debug!(reason = err.reason(), error = %err, "Token rejected");
        }
        _ => {
            tracing::warn!(reason = err.reason(), error = %err, "Token rejected");
        }
    }
}
