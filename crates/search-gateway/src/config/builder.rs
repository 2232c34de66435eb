//! Configuration builder

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::http::HeaderName;
use url::Url;

use crate::Error;
use crate::auth::{
    AdminCredential, DEFAULT_KEY_FETCH_TIMEOUT, DEFAULT_KEY_REFRESH_INTERVAL, IssuerConfig,
    KeyRegistryConfig,
};
use crate::gateway::{
    DEFAULT_BACKEND_TIMEOUT, DEFAULT_BLOCKED_PATHS, DEFAULT_BODY_LIMIT, DEFAULT_CREDENTIAL_HEADER,
    DEFAULT_SEARCH_PATH_SUFFIX,
};
use crate::rewrite::DEFAULT_TIME_FIELD;
use crate::tenant::{DEFAULT_DOCTYPE, DEFAULT_TENANT_TIMEOUT, TenantConfig};

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_SERVICE_NAME: &str = "search-gateway";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub keys: KeyRegistryConfig,
    pub auth: AuthConfig,
    pub tenant: TenantConfig,
    pub rewrite: RewriteConfig,
    pub observability: ObservabilityConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Upper bound on a whole request, backend round trip included
    pub request_timeout: Duration,
    pub body_limit: usize,
}

/// Search backend settings
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub timeout: Duration,
}

/// Caller credential settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub credential_header: HeaderName,
    /// `None` disables the Basic bypass
    pub admin: Option<AdminCredential>,
}

#[derive(Debug, Clone)]
pub struct RewriteConfig {
    pub time_field: String,
    pub search_path_suffix: String,
    pub blocked_paths: Vec<String>,
}

/// Logging and tracing export configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

/// Configuration builder with fluent API
pub struct ConfigBuilder {
    http_host: IpAddr,
    http_port: u16,
    request_timeout: Duration,
    body_limit: usize,
    backend_url: Option<Url>,
    backend_timeout: Duration,
    issuers: Vec<IssuerConfig>,
    key_refresh_interval: Duration,
    key_fetch_timeout: Duration,
    clock_skew: Duration,
    credential_header: Option<String>,
    admin_username: Option<String>,
    admin_password_hash: Option<String>,
    tenant_service_url: Option<Url>,
    tenant_doctype: Option<String>,
    tenant_timeout: Duration,
    tenant_api_key: Option<String>,
    tenant_api_secret: Option<String>,
    tenant_excluded_fields: Vec<String>,
    time_field: Option<String>,
    search_path_suffix: Option<String>,
    blocked_paths: Option<Vec<String>>,
    otlp_endpoint: Option<String>,
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: bool,
}

impl std::fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("http_host", &self.http_host)
            .field("http_port", &self.http_port)
            .field("backend_url", &self.backend_url.as_ref().map(Url::as_str))
            .field("issuers", &self.issuers)
            .field("credential_header", &self.credential_header)
            .field("admin_username", &self.admin_username)
            .field(
                "admin_password_hash",
                &self.admin_password_hash.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "tenant_service_url",
                &self.tenant_service_url.as_ref().map(Url::as_str),
            )
            .field(
                "tenant_api_secret",
                &self.tenant_api_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish_non_exhaustive()
    }
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            http_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: DEFAULT_HTTP_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            body_limit: DEFAULT_BODY_LIMIT,
            backend_url: None,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            issuers: Vec::new(),
            key_refresh_interval: DEFAULT_KEY_REFRESH_INTERVAL,
            key_fetch_timeout: DEFAULT_KEY_FETCH_TIMEOUT,
            clock_skew: Duration::ZERO,
            credential_header: None,
            admin_username: None,
            admin_password_hash: None,
            tenant_service_url: None,
            tenant_doctype: None,
            tenant_timeout: DEFAULT_TENANT_TIMEOUT,
            tenant_api_key: None,
            tenant_api_secret: None,
            tenant_excluded_fields: Vec::new(),
            time_field: None,
            search_path_suffix: None,
            blocked_paths: None,
            otlp_endpoint: None,
            service_name: None,
            log_level: None,
            json_logs: false,
        }
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.http_host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    #[must_use]
    pub fn backend_url(mut self, url: Url) -> Self {
        self.backend_url = Some(url);
        self
    }

    #[must_use]
    pub const fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    /// Replace the trusted issuer list
    #[must_use]
    pub fn issuers(mut self, issuers: Vec<IssuerConfig>) -> Self {
        self.issuers = issuers;
        self
    }

    #[must_use]
    pub fn add_issuer(mut self, issuer: IssuerConfig) -> Self {
        self.issuers.push(issuer);
        self
    }

    #[must_use]
    pub const fn key_refresh_interval(mut self, interval: Duration) -> Self {
        self.key_refresh_interval = interval;
        self
    }

    #[must_use]
    pub const fn key_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.key_fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    #[must_use]
    pub fn credential_header(mut self, header: String) -> Self {
        self.credential_header = Some(header);
        self
    }

    #[must_use]
    pub fn admin_username(mut self, username: String) -> Self {
        self.admin_username = Some(username);
        self
    }

    /// Set the stored `salt$hexdigest` admin secret
    #[must_use]
    pub fn admin_password_hash(mut self, hash: String) -> Self {
        self.admin_password_hash = Some(hash);
        self
    }

    #[must_use]
    pub fn tenant_service_url(mut self, url: Url) -> Self {
        self.tenant_service_url = Some(url);
        self
    }

    #[must_use]
    pub fn tenant_doctype(mut self, doctype: String) -> Self {
        self.tenant_doctype = Some(doctype);
        self
    }

    #[must_use]
    pub const fn tenant_timeout(mut self, timeout: Duration) -> Self {
        self.tenant_timeout = timeout;
        self
    }

    #[must_use]
    pub fn tenant_api_key(mut self, key: String) -> Self {
        self.tenant_api_key = Some(key);
        self
    }

    #[must_use]
    pub fn tenant_api_secret(mut self, secret: String) -> Self {
        self.tenant_api_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn tenant_excluded_fields(mut self, fields: Vec<String>) -> Self {
        self.tenant_excluded_fields = fields;
        self
    }

    #[must_use]
    pub fn time_field(mut self, field: String) -> Self {
        self.time_field = Some(field);
        self
    }

    #[must_use]
    pub fn search_path_suffix(mut self, suffix: String) -> Self {
        self.search_path_suffix = Some(suffix);
        self
    }

    #[must_use]
    pub fn blocked_paths(mut self, paths: Vec<String>) -> Self {
        self.blocked_paths = Some(paths);
        self
    }

    #[must_use]
    pub fn otlp_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.otlp_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.service_name = Some(name);
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.log_level = Some(level);
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        let backend_url = self
            .backend_url
            .ok_or_else(|| Error::Config("backend.url is required".into()))?;

        if self.issuers.is_empty() {
            return Err(Error::Config(
                "at least one trusted issuer is required".into(),
            ));
        }

        if self.key_refresh_interval.is_zero() {
            return Err(Error::Config(
                "keys.refresh_interval_secs must be greater than zero".into(),
            ));
        }

        let tenant_url = self
            .tenant_service_url
            .ok_or_else(|| Error::Config("tenant.service_url is required".into()))?;

        let header_name = self
            .credential_header
            .as_deref()
            .unwrap_or(DEFAULT_CREDENTIAL_HEADER);
        let credential_header = HeaderName::try_from(header_name.trim()).map_err(|e| {
            Error::Config(format!("invalid credential header '{header_name}': {e}"))
        })?;

        let admin = match (self.admin_username, self.admin_password_hash) {
            (Some(username), Some(hash)) => Some(
                AdminCredential::new(username, &hash)
                    .map_err(|e| Error::Config(e.to_string()))?,
            ),
            (None, None) => None,
            _ => {
                return Err(Error::Config(
                    "admin_username and admin_password_hash must be set together".into(),
                ));
            }
        };

        let mut tenant = TenantConfig::new(tenant_url).with_timeout(self.tenant_timeout);
        tenant.doctype = self
            .tenant_doctype
            .unwrap_or_else(|| DEFAULT_DOCTYPE.to_string());
        tenant.api_key = self.tenant_api_key;
        tenant.api_secret = self.tenant_api_secret;
        tenant.excluded_fields = self.tenant_excluded_fields;

        let rewrite = RewriteConfig {
            time_field: self
                .time_field
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_TIME_FIELD.to_string()),
            search_path_suffix: self
                .search_path_suffix
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SEARCH_PATH_SUFFIX.to_string()),
            blocked_paths: self.blocked_paths.unwrap_or_else(|| {
                DEFAULT_BLOCKED_PATHS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            }),
        };

        let observability = ObservabilityConfig {
            otlp_endpoint: self.otlp_endpoint,
            service_name: self
                .service_name
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string()),
            log_level: self
                .log_level
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            json_logs: self.json_logs,
        };

        Ok(Config {
            server: ServerConfig {
                host: self.http_host,
                port: self.http_port,
                request_timeout: self.request_timeout,
                body_limit: self.body_limit,
            },
            backend: BackendConfig {
                url: backend_url,
                timeout: self.backend_timeout,
            },
            keys: KeyRegistryConfig {
                issuers: self.issuers,
                refresh_interval: self.key_refresh_interval,
                fetch_timeout: self.key_fetch_timeout,
                clock_skew: self.clock_skew,
            },
            auth: AuthConfig {
                credential_header,
                admin,
            },
            tenant,
            rewrite,
            observability,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
