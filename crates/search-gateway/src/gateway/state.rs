//! Shared per-process gateway services

use std::sync::Arc;

use axum::http::HeaderName;

use super::policy::RoutePolicy;
use super::proxy::BackendClient;
use crate::Error;
use crate::auth::{AdminCredential, KeyRegistry, TokenVerifier};
use crate::config::Config;
use crate::rewrite::QueryRewriter;
use crate::tenant::{HttpTenantSource, TenantDirectory};

/// Default header carrying the caller's signed token
pub const DEFAULT_CREDENTIAL_HEADER: &str = "x-grafana-id";

/// Default maximum inbound request body size
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct GatewayState {
    inner: Arc<Inner>,
}

struct Inner {
    verifier: TokenVerifier,
    tenants: TenantDirectory,
    rewriter: QueryRewriter,
    policy: RoutePolicy,
    backend: BackendClient,
    admin: Option<AdminCredential>,
    credential_header: HeaderName,
    body_limit: usize,
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("backend", &self.inner.backend.base_url().as_str())
            .field("credential_header", &self.inner.credential_header)
            .field("policy", &self.inner.policy)
            .field("admin_bypass", &self.inner.admin.is_some())
            .field("body_limit", &self.inner.body_limit)
            .finish_non_exhaustive()
    }
}

impl GatewayState {
    #[must_use]
    pub fn builder(
        verifier: TokenVerifier,
        tenants: TenantDirectory,
        backend: BackendClient,
    ) -> GatewayStateBuilder {
        GatewayStateBuilder {
            verifier,
            tenants,
            backend,
            rewriter: QueryRewriter::default(),
            policy: RoutePolicy::default(),
            admin: None,
            credential_header: HeaderName::from_static(DEFAULT_CREDENTIAL_HEADER),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Wire the HTTP-backed services described by `config` around an
    /// already loaded key registry.
    pub fn from_config(config: &Config, registry: Arc<KeyRegistry>) -> crate::Result<Self> {
        let verifier = TokenVerifier::new(registry, config.keys.clock_skew);

        let source = HttpTenantSource::new(
            config.tenant.clone(),
            config.auth.credential_header.clone(),
        )
        .map_err(|e| Error::Config(e.to_string()))?;
        let tenants = TenantDirectory::new(Arc::new(source), config.tenant.timeout);

        let backend = BackendClient::new(config.backend.url.clone(), config.backend.timeout)?;

        let rewriter = QueryRewriter::new(config.rewrite.time_field.clone())
            .with_excluded_fields(config.tenant.excluded_fields.clone());
        let policy = RoutePolicy::new(
            config.rewrite.blocked_paths.clone(),
            config.rewrite.search_path_suffix.clone(),
        );

        Ok(Self::builder(verifier, tenants, backend)
            .rewriter(rewriter)
            .policy(policy)
            .admin(config.auth.admin.clone())
            .credential_header(config.auth.credential_header.clone())
            .body_limit(config.server.body_limit)
            .build())
    }

    pub(crate) fn verifier(&self) -> &TokenVerifier {
        &self.inner.verifier
    }

    pub(crate) fn tenants(&self) -> &TenantDirectory {
        &self.inner.tenants
    }

    pub(crate) fn rewriter(&self) -> &QueryRewriter {
        &self.inner.rewriter
    }

    pub(crate) fn policy(&self) -> &RoutePolicy {
        &self.inner.policy
    }

    pub(crate) fn backend(&self) -> &BackendClient {
        &self.inner.backend
    }

    pub(crate) fn admin(&self) -> Option<&AdminCredential> {
        self.inner.admin.as_ref()
    }

    pub(crate) fn credential_header(&self) -> &HeaderName {
        &self.inner.credential_header
    }

    pub(crate) fn body_limit(&self) -> usize {
        self.inner.body_limit
    }
}

#[derive(Debug)]
pub struct GatewayStateBuilder {
    verifier: TokenVerifier,
    tenants: TenantDirectory,
    backend: BackendClient,
    rewriter: QueryRewriter,
    policy: RoutePolicy,
    admin: Option<AdminCredential>,
    credential_header: HeaderName,
    body_limit: usize,
}

impl GatewayStateBuilder {
    #[must_use]
    pub fn rewriter(mut self, rewriter: QueryRewriter) -> Self {
        self.rewriter = rewriter;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: RoutePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn admin(mut self, admin: Option<AdminCredential>) -> Self {
        self.admin = admin;
        self
    }

    #[must_use]
    pub fn credential_header(mut self, header: HeaderName) -> Self {
        self.credential_header = header;
        self
    }

    #[must_use]
    pub const fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    #[must_use]
    pub fn build(self) -> GatewayState {
        GatewayState {
            inner: Arc::new(Inner {
                verifier: self.verifier,
                tenants: self.tenants,
                rewriter: self.rewriter,
                policy: self.policy,
                backend: self.backend,
                admin: self.admin,
                credential_header: self.credential_header,
                body_limit: self.body_limit,
            }),
        }
    }
}
