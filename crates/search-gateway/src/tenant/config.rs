//! Tenant-metadata service configuration

use std::time::Duration;

use url::Url;

pub const DEFAULT_TENANT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DOCTYPE: &str = "Log User";

#[derive(Clone)]
pub struct TenantConfig {
    /// Base URL of the tenant-metadata service
    pub service_url: Url,
    /// Resource type holding one record per principal
    pub doctype: String,
    pub timeout: Duration,
    /// Service API key, sent as `Authorization: token key:secret` with
    /// [`TenantConfig::api_secret`]
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    /// Attribute names excluded from filters on top of the built-in set
    pub excluded_fields: Vec<String>,
}

impl std::fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConfig")
            .field("service_url", &self.service_url.as_str())
            .field("doctype", &self.doctype)
            .field("timeout", &self.timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "[REDACTED]"))
            .field("excluded_fields", &self.excluded_fields)
            .finish()
    }
}

impl TenantConfig {
    #[must_use]
    pub fn new(service_url: Url) -> Self {
        Self {
            service_url,
            doctype: DEFAULT_DOCTYPE.to_string(),
            timeout: DEFAULT_TENANT_TIMEOUT,
            api_key: None,
            api_secret: None,
            excluded_fields: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_api_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self.api_secret = Some(secret.into());
        self
    }

    /// `token key:secret` when both halves are configured
    #[must_use]
    pub fn service_authorization(&self) -> Option<String> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Some(format!("token {key}:{secret}")),
            _ => None,
        }
    }
}
