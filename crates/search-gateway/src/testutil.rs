//! Shared helpers for unit tests: a fixture signing key, token minting and
//! in-memory key/tenant sources that count their calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use parking_lot::Mutex;
use serde_json::{Value, json};
use url::Url;

use crate::auth::{AuthError, IssuerConfig, JwkSet, KeySource};
use crate::tenant::{TenantError, TenantRecord, TenantSource};

pub const TEST_ISSUER: &str = "https://grafana.example.com";
pub const TEST_KID: &str = "test-kid-1";

/// Public coordinates of `tests/fixtures/es256_private.pem`
pub const TEST_X: &str = "Wg7N0dwkvh8Pf2SIKNQsQ3931oh9_UXN2StEj6l4PoY";
pub const TEST_Y: &str = "3en20CTszAxHGvua8iNu-Ft9siGmeGndQj-URWrCnNA";

const TEST_PRIVATE_PEM: &[u8] = include_bytes!("../tests/fixtures/es256_private.pem");
const OTHER_PRIVATE_PEM: &[u8] = include_bytes!("../tests/fixtures/es256_other_private.pem");

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn test_issuer_config() -> IssuerConfig {
    IssuerConfig::new(
        TEST_ISSUER,
        Url::parse("https://grafana.example.com/api/signing-keys/keys").unwrap(),
    )
}

pub fn test_jwks() -> JwkSet {
    serde_json::from_value(json!({
        "keys": [{
            "kid": TEST_KID,
            "kty": "EC",
            "alg": "ES256",
            "crv": "P-256",
            "use": "sig",
            "x": TEST_X,
            "y": TEST_Y
        }]
    }))
    .unwrap()
}

fn sign(claims: &Value, kid: &str, pem: &[u8]) -> String {
    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_ec_pem(pem).unwrap()).unwrap()
}

/// Sign `claims` with the fixture key under `kid`
pub fn sign_token(claims: &Value, kid: &str) -> String {
    sign(claims, kid, TEST_PRIVATE_PEM)
}

/// Sign `claims` with a key that is not published in [`test_jwks`]
pub fn sign_token_with_other_key(claims: &Value, kid: &str) -> String {
    sign(claims, kid, OTHER_PRIVATE_PEM)
}

pub fn valid_claims(email: &str) -> Value {
    json!({
        "iss": TEST_ISSUER,
        "sub": "user:42",
        "email": email,
        "iat": now_secs(),
        "exp": now_secs() + 3600
    })
}

/// Key source serving fixed documents per issuer
#[derive(Debug, Default)]
pub struct StaticKeySource {
    documents: Mutex<HashMap<String, JwkSet>>,
    calls: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl StaticKeySource {
    pub fn with_document(issuer: &str, jwks: JwkSet) -> Arc<Self> {
        let source = Self::default();
        source.documents.lock().insert(issuer.to_string(), jwks);
        Arc::new(source)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_document(&self, issuer: &str, jwks: JwkSet) {
        self.documents.lock().insert(issuer.to_string(), jwks);
    }

    pub fn calls_for(&self, issuer: &str) -> usize {
        self.calls.lock().iter().filter(|i| *i == issuer).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self, issuer: &IssuerConfig) -> Result<JwkSet, AuthError> {
        self.calls.lock().push(issuer.issuer.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::KeyFetch {
                issuer: issuer.issuer.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.documents
            .lock()
            .get(&issuer.issuer)
            .cloned()
            .ok_or_else(|| AuthError::KeyFetch {
                issuer: issuer.issuer.clone(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

/// Tenant source backed by a map of principal → record
#[derive(Debug, Default)]
pub struct StaticTenantSource {
    records: Mutex<HashMap<String, TenantRecord>>,
    calls: AtomicUsize,
    seen_credentials: Mutex<Vec<String>>,
}

impl StaticTenantSource {
    pub fn with_record(principal: &str, record: &Value) -> Arc<Self> {
        let source = Self::default();
        source.records.lock().insert(
            principal.to_string(),
            TenantRecord::from_value(record.clone()).unwrap(),
        );
        Arc::new(source)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_credentials(&self) -> Vec<String> {
        self.seen_credentials.lock().clone()
    }
}

#[async_trait]
impl TenantSource for StaticTenantSource {
    async fn fetch(&self, credential: &str, principal: &str) -> Result<TenantRecord, TenantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials.lock().push(credential.to_string());
        self.records
            .lock()
            .get(principal)
            .cloned()
            .ok_or(TenantError::Status(reqwest::StatusCode::NOT_FOUND))
    }
}
