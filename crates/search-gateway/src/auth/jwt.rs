//! Compact JWS verification against the key registry
//!
//! The key depends on the `iss` claim, so verification runs in two passes:
//! the header and payload are decoded untrusted to pick the key, then the
//! signature is checked over the raw segments and only afterwards are the
//! claims read as trusted.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::claims::{VerifiedClaims, unverified_issuer};
use super::error::{AuthError, Result};
use super::registry::KeyRegistry;

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Token verifier
pub struct TokenVerifier {
    registry: Arc<KeyRegistry>,
    leeway: Duration,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("leeway", &self.leeway)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    #[must_use]
    pub const fn new(registry: Arc<KeyRegistry>, leeway: Duration) -> Self {
        Self { registry, leeway }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }

    pub fn verify(&self, token: &str) -> Result<VerifiedClaims> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX));
        self.verify_at(token, now)
    }

    /// Verify `token` as of `now` (seconds since epoch)
    pub fn verify_at(&self, token: &str, now: i64) -> Result<VerifiedClaims> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(AuthError::MalformedToken("expected three segments"));
        };

        let header: TokenHeader = decode_segment(header_b64, "header is not valid JSON")?;
        let kid = header
            .kid
            .ok_or(AuthError::MalformedToken("header has no kid"))?;
        let payload: Map<String, Value> =
            decode_segment(payload_b64, "payload is not a JSON object")?;
        let issuer = unverified_issuer(&payload)?;

        let key = self.registry.key_for(issuer, &kid)?;

        if Algorithm::from_str(&header.alg).ok() != Some(key.algorithm) {
            return Err(AuthError::AlgorithmMismatch {
                expected: key.algorithm,
                found: header.alg,
            });
        }

        check_signature_length(signature_b64, key.algorithm)?;

        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        let valid = jsonwebtoken::crypto::verify(
            signature_b64,
            signing_input.as_bytes(),
            &key.key,
            key.algorithm,
        )?;
        if !valid {
            return Err(AuthError::InvalidSignature);
        }

        let claims = VerifiedClaims::from_payload(payload)?;
        let leeway = i64::try_from(self.leeway.as_secs()).unwrap_or(i64::MAX);
        claims.validate_times(now, leeway)?;

        Ok(claims)
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &'static str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| AuthError::MalformedToken("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| AuthError::MalformedToken(what))
}

/// EC signatures are `r || s` with fixed-width integers; anything else is
/// rejected before the curve math runs.
fn check_signature_length(signature_b64: &str, algorithm: Algorithm) -> Result<()> {
    let expected = match algorithm {
        Algorithm::ES256 => 64,
        Algorithm::ES384 => 96,
        _ => return Ok(()),
    };
    let actual = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::MalformedToken("signature is not base64url"))?
        .len();
    if actual != expected {
        return Err(AuthError::InvalidSignatureLength { expected, actual });
    }
    Ok(())
}
