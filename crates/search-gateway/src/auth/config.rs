//! Authentication configuration types

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use super::error::{AuthError, Result};

/// Default interval between background keyset refreshes
pub const DEFAULT_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Default per-attempt timeout for keyset fetches
pub const DEFAULT_KEY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A trusted token issuer and where its verification keys are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerConfig {
    /// Issuer identity, compared verbatim against the `iss` claim
    pub issuer: String,
    /// Key publishing endpoint (JWKS document)
    pub jwks_url: Url,
    /// Signing algorithm every token from this issuer must use
    pub algorithm: Algorithm,
}

impl IssuerConfig {
    #[must_use]
    pub fn new(issuer: impl Into<String>, jwks_url: Url) -> Self {
        Self {
            issuer: issuer.into(),
            jwks_url,
            algorithm: Algorithm::ES256,
        }
    }

    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Parse an `issuer=jwks_url` pair, as accepted on the command line and
    /// in `GATEWAY_ISSUERS`.
    pub fn parse_pair(pair: &str) -> Result<Self> {
        let (issuer, url) = pair
            .split_once('=')
            .ok_or_else(|| AuthError::Config(format!("expected issuer=url, got '{pair}'")))?;
        let issuer = issuer.trim();
        if issuer.is_empty() {
            return Err(AuthError::Config(format!("empty issuer in '{pair}'")));
        }
        let jwks_url = Url::parse(url.trim())
            .map_err(|e| AuthError::Config(format!("invalid JWKS URL for {issuer}: {e}")))?;
        Ok(Self::new(issuer, jwks_url))
    }
}

/// Parse an algorithm name, restricted to the asymmetric algorithms the
/// key registry can load from a JWKS document.
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    let alg = Algorithm::from_str(name)
        .map_err(|_| AuthError::Config(format!("unknown signing algorithm: {name}")))?;
    match alg {
        Algorithm::ES256
        | Algorithm::ES384
        | Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512 => Ok(alg),
        other => Err(AuthError::Config(format!(
            "unsupported signing algorithm for issuer keys: {other:?}"
        ))),
    }
}

/// Key registry settings
#[derive(Debug, Clone)]
pub struct KeyRegistryConfig {
    pub issuers: Vec<IssuerConfig>,
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
    /// Leeway applied to `exp`/`nbf` checks
    pub clock_skew: Duration,
}

impl Default for KeyRegistryConfig {
    fn default() -> Self {
        Self {
            issuers: Vec::new(),
            refresh_interval: DEFAULT_KEY_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_KEY_FETCH_TIMEOUT,
            clock_skew: Duration::ZERO,
        }
    }
}
