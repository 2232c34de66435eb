//! Request gateway: authentication, tenant scoping and forwarding

mod error;
mod handler;
mod policy;
mod proxy;
mod state;

pub use error::GatewayError;
pub use handler::{handle, router};
pub use policy::{DEFAULT_BLOCKED_PATHS, DEFAULT_SEARCH_PATH_SUFFIX, RequestTarget, RoutePolicy};
pub use proxy::{BackendClient, DEFAULT_BACKEND_TIMEOUT, forwardable_headers};
pub use state::{
    DEFAULT_BODY_LIMIT, DEFAULT_CREDENTIAL_HEADER, GatewayState, GatewayStateBuilder,
};

#[cfg(feature = "metrics")]
async fn metrics_handler() -> impl axum::response::IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        crate::observability::render_metrics(),
    )
}
