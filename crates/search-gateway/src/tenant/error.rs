//! Tenant lookup errors

use std::time::Duration;

use thiserror::Error;

/// Every variant surfaces to callers as an upstream failure (`500`).
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("tenant service unreachable: {0}")]
    Transport(String),

    #[error("tenant service timed out after {0:?}")]
    Timeout(Duration),

    #[error("tenant service returned {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed tenant envelope: {0}")]
    MalformedEnvelope(String),

    #[error("tenant configuration error: {0}")]
    Config(String),
}

impl TenantError {
    /// Short, stable label for logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout(_) => "timeout",
            Self::Status(_) => "status",
            Self::MalformedEnvelope(_) => "malformed",
            Self::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for TenantError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::MalformedEnvelope(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, TenantError>;
