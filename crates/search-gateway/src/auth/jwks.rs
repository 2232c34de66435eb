//! JWKS documents and immutable keyset snapshots

use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;

use super::error::{AuthError, Result};

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC)
    pub kty: String,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// Key usage
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// A decoded public key together with the algorithm it verifies
#[derive(Clone)]
pub struct VerificationKey {
    pub key: DecodingKey,
    pub algorithm: Algorithm,
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Immutable key-id → key snapshot for one issuer.
///
/// Built in full before it is installed, so readers never observe a
/// partially populated set.
#[derive(Clone, Default)]
pub struct Keyset {
    keys: HashMap<String, VerificationKey>,
}

impl std::fmt::Debug for Keyset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        kids.sort_unstable();
        f.debug_struct("Keyset").field("kids", &kids).finish()
    }
}

impl Keyset {
    /// Build a keyset from a fetched document, keeping only keys usable with
    /// `algorithm`. Fails when nothing usable remains.
    pub fn from_jwk_set(issuer: &str, jwks: &JwkSet, algorithm: Algorithm) -> Result<Self> {
        let mut keys = HashMap::new();

        for jwk in &jwks.keys {
            let Some(kid) = jwk.kid.as_deref() else {
                tracing::debug!(issuer, kty = %jwk.kty, "Skipping JWK without kid");
                continue;
            };

            match decode_jwk(jwk) {
                Ok(Some((key, alg))) if alg == algorithm => {
                    keys.insert(kid.to_string(), VerificationKey { key, algorithm });
                }
                Ok(Some((_, alg))) => {
                    tracing::debug!(issuer, kid, ?alg, expected = ?algorithm, "Skipping JWK for other algorithm");
                }
                Ok(None) => {
                    tracing::debug!(issuer, kid, kty = %jwk.kty, "Skipping unsupported JWK");
                }
                Err(reason) => {
                    tracing::debug!(issuer, kid, %reason, "Skipping undecodable JWK");
                }
            }
        }

        if keys.is_empty() {
            return Err(AuthError::EmptyKeyset(issuer.to_string()));
        }

        Ok(Self { keys })
    }

    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

fn decode_jwk(jwk: &Jwk) -> std::result::Result<Option<(DecodingKey, Algorithm)>, String> {
    if jwk.r#use.as_deref().is_some_and(|u| u != "sig") {
        return Ok(None);
    }

    let alg = match jwk.alg.as_deref() {
        Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some("ES256") => Algorithm::ES256,
        Some("ES384") => Algorithm::ES384,
        None => {
            // Infer from key type
            match jwk.kty.as_str() {
                "RSA" => Algorithm::RS256,
                "EC" => match jwk.crv.as_deref() {
                    Some("P-256") => Algorithm::ES256,
                    Some("P-384") => Algorithm::ES384,
                    _ => return Ok(None),
                },
                _ => return Ok(None),
            }
        }
        _ => return Ok(None),
    };

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref().ok_or("missing 'n' in RSA key")?;
            let e = jwk.e.as_ref().ok_or("missing 'e' in RSA key")?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| format!("invalid RSA components: {e}"))?
        }
        "EC" => {
            let x = jwk.x.as_ref().ok_or("missing 'x' in EC key")?;
            let y = jwk.y.as_ref().ok_or("missing 'y' in EC key")?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| format!("invalid EC components: {e}"))?
        }
        _ => return Ok(None),
    };

    Ok(Some((key, alg)))
}
