//! External tenant-metadata lookups

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use url::Url;

use super::config::TenantConfig;
use super::error::{Result, TenantError};
use super::record::TenantRecord;

/// Resolves one principal to its tenant record
#[async_trait]
pub trait TenantSource: Send + Sync {
    /// `credential` is the caller's original token, forwarded so the service
    /// can check it independently.
    async fn fetch(&self, credential: &str, principal: &str) -> Result<TenantRecord>;
}

/// Looks records up at `GET {service_url}/api/resource/{doctype}/{principal}`
#[derive(Debug, Clone)]
pub struct HttpTenantSource {
    client: reqwest::Client,
    config: TenantConfig,
    credential_header: HeaderName,
}

impl HttpTenantSource {
    pub fn new(config: TenantConfig, credential_header: HeaderName) -> Result<Self> {
        if config.service_url.cannot_be_a_base() {
            return Err(TenantError::Config(format!(
                "tenant service URL cannot be a base: {}",
                config.service_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TenantError::Config(e.to_string()))?;
        Ok(Self {
            client,
            config,
            credential_header,
        })
    }

    /// Record URL for `principal`, each segment percent-encoded
    pub fn record_url(&self, principal: &str) -> Result<Url> {
        let mut url = self.config.service_url.clone();
        url.path_segments_mut()
            .map_err(|()| TenantError::Config("tenant service URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["api", "resource", self.config.doctype.as_str(), principal]);
        Ok(url)
    }
}

#[async_trait]
impl TenantSource for HttpTenantSource {
    async fn fetch(&self, credential: &str, principal: &str) -> Result<TenantRecord> {
        let url = self.record_url(principal)?;
        let mut request = self.client.get(url);

        if let Ok(value) = HeaderValue::from_str(credential) {
            request = request.header(self.credential_header.clone(), value);
        }
        if let Some(auth) = self.config.service_authorization() {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TenantError::Timeout(self.config.timeout)
            } else {
                TenantError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TenantError::Status(status));
        }

        let envelope: serde_json::Value = response.json().await?;
        TenantRecord::from_envelope(envelope)
    }
}
