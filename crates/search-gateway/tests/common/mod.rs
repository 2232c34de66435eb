//! Shared fixtures for the gateway integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Router;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use search_gateway::auth::{HttpKeySource, IssuerConfig, KeyRegistry};
use search_gateway::config::{Config, ConfigBuilder};
use search_gateway::transport::build_app;
use search_gateway::{GatewayState, auth};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ISSUER: &str = "https://grafana.example.com";
pub const KID: &str = "it-kid";
pub const EMAIL: &str = "alice@acme.test";
pub const JWKS_PATH: &str = "/api/signing-keys/keys";

const PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/es256_private.pem");
const X: &str = "Wg7N0dwkvh8Pf2SIKNQsQ3931oh9_UXN2StEj6l4PoY";
const Y: &str = "3en20CTszAxHGvua8iNu-Ft9siGmeGndQj-URWrCnNA";

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn jwks_document() -> Value {
    json!({
        "keys": [{
            "kid": KID,
            "kty": "EC",
            "alg": "ES256",
            "crv": "P-256",
            "use": "sig",
            "x": X,
            "y": Y
        }]
    })
}

pub fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::ES256);
    header.kid = Some(KID.to_string());
    encode(&header, claims, &EncodingKey::from_ec_pem(PRIVATE_PEM).unwrap()).unwrap()
}

pub fn claims_for(email: &str) -> Value {
    json!({
        "iss": ISSUER,
        "sub": "user:42",
        "email": email,
        "iat": now_secs(),
        "exp": now_secs() + 3600
    })
}

/// Mock servers standing in for the key endpoint, the tenant service and the
/// search backend
pub struct Upstreams {
    pub keys: MockServer,
    pub tenants: MockServer,
    pub backend: MockServer,
}

impl Upstreams {
    pub async fn start() -> Self {
        let keys = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document()))
            .mount(&keys)
            .await;

        Self {
            keys,
            tenants: MockServer::start().await,
            backend: MockServer::start().await,
        }
    }

    /// Serve `record` as the tenant record of `principal`
    pub async fn tenant_record(&self, principal: &str, record: &Value) {
        let escaped = principal.replace('.', r"\.");
        Mock::given(method("GET"))
            .and(path_regex(format!(r"^/api/resource/[^/]+/{escaped}$")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": record })))
            .mount(&self.tenants)
            .await;
    }

    pub async fn backend_ok(&self, body: &Value) {
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.backend)
            .await;
    }

    pub fn config(&self) -> ConfigBuilder {
        let jwks_url = Url::parse(&format!("{}{JWKS_PATH}", self.keys.uri())).unwrap();
        ConfigBuilder::new()
            .backend_url(Url::parse(&self.backend.uri()).unwrap())
            .add_issuer(IssuerConfig::new(ISSUER, jwks_url))
            .tenant_service_url(Url::parse(&self.tenants.uri()).unwrap())
            .key_fetch_timeout(Duration::from_secs(2))
            .tenant_timeout(Duration::from_secs(2))
            .backend_timeout(Duration::from_secs(5))
    }

    /// Load keys over HTTP and assemble the full router
    pub async fn app(&self, config: &Config) -> Router {
        let source = Arc::new(HttpKeySource::new(config.keys.fetch_timeout).unwrap());
        let registry = KeyRegistry::load(config.keys.issuers.clone(), source, config.keys.fetch_timeout)
            .await
            .unwrap();
        let state = GatewayState::from_config(config, Arc::new(registry)).unwrap();
        build_app(state, Duration::from_secs(10))
    }

    pub async fn received(server: &MockServer) -> Vec<wiremock::Request> {
        server.received_requests().await.unwrap_or_default()
    }
}

pub fn admin_hash(password: &str) -> String {
    auth::hash_password("it-salt", password)
}
