//! Authentication error types
//!
//! Every variant except the key-loading ones surfaces to callers as a single
//! `401`; the variant itself is only used for logging.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("malformed token: {0}")]
    MalformedToken(&'static str),

    #[error("missing claim: {0}")]
    MissingClaim(&'static str),

    #[error("issuer not configured: {0}")]
    UnknownIssuer(String),

    #[error("key not found: kid={kid} issuer={issuer}")]
    KeyNotFound { issuer: String, kid: String },

    #[error("algorithm mismatch: expected {expected:?}, token declares {found}")]
    AlgorithmMismatch {
        expected: jsonwebtoken::Algorithm,
        found: String,
    },

    #[error("invalid signature length: expected {expected} bytes, got {actual}")]
    InvalidSignatureLength { expected: usize, actual: usize },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    TokenExpired,

    #[error("token not yet valid")]
    TokenNotYetValid,

    #[error("key fetch failed for {issuer}: {reason}")]
    KeyFetch { issuer: String, reason: String },

    #[error("key parse failed for {issuer}: {reason}")]
    KeyParse { issuer: String, reason: String },

    #[error("no usable verification keys published by {0}")]
    EmptyKeyset(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether the error came from loading or refreshing a keyset rather
    /// than from verifying a token.
    #[must_use]
    pub const fn is_key_load_error(&self) -> bool {
        matches!(
            self,
            Self::KeyFetch { .. }
                | Self::KeyParse { .. }
                | Self::EmptyKeyset(_)
                | Self::HttpClient(_)
        )
    }

    /// Short, stable label for logs and metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MalformedToken(_) => "malformed",
            Self::MissingClaim(_) => "missing_claim",
            Self::UnknownIssuer(_) => "unknown_issuer",
            Self::KeyNotFound { .. } => "unknown_key",
            Self::AlgorithmMismatch { .. } => "algorithm_mismatch",
            Self::InvalidSignatureLength { .. } => "signature_length",
            Self::InvalidSignature => "signature",
            Self::TokenExpired => "expired",
            Self::TokenNotYetValid => "not_yet_valid",
            Self::KeyFetch { .. } | Self::HttpClient(_) => "key_fetch",
            Self::KeyParse { .. } | Self::EmptyKeyset(_) => "key_parse",
            Self::Config(_) => "config",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::Base64(_) => Self::MalformedToken("signature is not base64url"),
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::ImmatureSignature => Self::TokenNotYetValid,
            _ => Self::InvalidSignature,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
