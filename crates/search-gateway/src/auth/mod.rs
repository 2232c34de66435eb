//! Caller authentication
//!
//! Tokens arrive as compact JWS strings signed by one of several trusted
//! issuers. Each issuer publishes its own JWKS document; the
//! [`KeyRegistry`] keeps one snapshot per issuer and refreshes it in the
//! background, and [`TokenVerifier`] picks the key by (`iss`, `kid`).
//!
//! A static administrative Basic credential ([`AdminCredential`]) bypasses
//! token verification.

mod admin;
mod claims;
mod config;
mod error;
mod jwks;
mod jwt;
mod registry;

pub use admin::{AdminCredential, hash_password, is_basic, parse_basic};
pub use claims::VerifiedClaims;
pub use config::{
    DEFAULT_KEY_FETCH_TIMEOUT, DEFAULT_KEY_REFRESH_INTERVAL, IssuerConfig, KeyRegistryConfig,
    parse_algorithm,
};
pub use error::{AuthError, Result};
pub use jwks::{Jwk, JwkSet, Keyset, VerificationKey};
pub use jwt::TokenVerifier;
pub use registry::{HttpKeySource, KeyRefreshTask, KeyRegistry, KeySource};
