//! Multi-issuer key registry with background refresh
//!
//! Each configured issuer owns one [`Keyset`] snapshot held in an
//! [`ArcSwap`]. Readers load the current snapshot without locking; a refresh
//! fetches and decodes the new document first and only then swaps the
//! pointer, so a verification never waits on the network. A failed refresh
//! leaves the previous snapshot in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::Algorithm;

use super::config::IssuerConfig;
use super::error::{AuthError, Result};
use super::jwks::{JwkSet, Keyset, VerificationKey};

/// Where keyset documents come from
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the current key document for `issuer`
    async fn fetch(&self, issuer: &IssuerConfig) -> Result<JwkSet>;
}

/// Fetches JWKS documents over HTTP
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    client: reqwest::Client,
}

impl HttpKeySource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self, issuer: &IssuerConfig) -> Result<JwkSet> {
        tracing::debug!(issuer = %issuer.issuer, jwks_url = %issuer.jwks_url, "Fetching JWKS");

        let response = self
            .client
            .get(issuer.jwks_url.clone())
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch {
                issuer: issuer.issuer.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AuthError::KeyFetch {
                issuer: issuer.issuer.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        response.json().await.map_err(|e| AuthError::KeyParse {
            issuer: issuer.issuer.clone(),
            reason: e.to_string(),
        })
    }
}

struct IssuerEntry {
    config: IssuerConfig,
    keys: ArcSwap<Keyset>,
}

/// Per-issuer verification keys
pub struct KeyRegistry {
    issuers: HashMap<String, IssuerEntry>,
    source: Arc<dyn KeySource>,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for KeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: HashMap<&str, usize> = self
            .issuers
            .iter()
            .map(|(issuer, entry)| (issuer.as_str(), entry.keys.load().len()))
            .collect();
        f.debug_struct("KeyRegistry")
            .field("keys", &keys)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl KeyRegistry {
    /// Fetch every issuer's keyset. Any failure aborts the load: a gateway
    /// that cannot verify one of its issuers must not start.
    pub async fn load(
        configs: Vec<IssuerConfig>,
        source: Arc<dyn KeySource>,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        if configs.is_empty() {
            return Err(AuthError::Config("at least one issuer is required".into()));
        }

        let mut issuers = HashMap::with_capacity(configs.len());
        for config in configs {
            let keyset = fetch_keyset(source.as_ref(), &config, fetch_timeout).await?;
            tracing::info!(
                issuer = %config.issuer,
                jwks_url = %config.jwks_url,
                kid_count = keyset.len(),
                "Issuer keyset loaded"
            );
            issuers.insert(
                config.issuer.clone(),
                IssuerEntry {
                    config,
                    keys: ArcSwap::from_pointee(keyset),
                },
            );
        }

        Ok(Self {
            issuers,
            source,
            fetch_timeout,
        })
    }

    #[must_use]
    pub fn is_configured(&self, issuer: &str) -> bool {
        self.issuers.contains_key(issuer)
    }

    /// Signing algorithm configured for `issuer`
    #[must_use]
    pub fn algorithm_for(&self, issuer: &str) -> Option<Algorithm> {
        self.issuers.get(issuer).map(|e| e.config.algorithm)
    }

    /// Look up the verification key for (`issuer`, `kid`) in the current
    /// snapshot.
    pub fn key_for(&self, issuer: &str, kid: &str) -> Result<VerificationKey> {
        let entry = self
            .issuers
            .get(issuer)
            .ok_or_else(|| AuthError::UnknownIssuer(issuer.to_string()))?;

        entry
            .keys
            .load()
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound {
                issuer: issuer.to_string(),
                kid: kid.to_string(),
            })
    }

    /// Number of keys in the current snapshot for `issuer`
    #[must_use]
    pub fn key_count(&self, issuer: &str) -> Option<usize> {
        self.issuers.get(issuer).map(|e| e.keys.load().len())
    }

    pub fn issuers(&self) -> impl Iterator<Item = &str> {
        self.issuers.keys().map(String::as_str)
    }

    /// Refetch one issuer's keyset and install it. On error the previous
    /// snapshot stays in place.
    pub async fn refresh_issuer(&self, issuer: &str) -> Result<usize> {
        let entry = self
            .issuers
            .get(issuer)
            .ok_or_else(|| AuthError::UnknownIssuer(issuer.to_string()))?;

        let keyset = fetch_keyset(self.source.as_ref(), &entry.config, self.fetch_timeout).await?;
        let count = keyset.len();
        entry.keys.store(Arc::new(keyset));
        Ok(count)
    }

    /// Refresh every issuer, logging failures. Returns the number of issuers
    /// that failed.
    pub async fn refresh_all(&self) -> usize {
        let mut failures = 0;
        for issuer in self.issuers.keys() {
            match self.refresh_issuer(issuer).await {
                Ok(kid_count) => {
                    tracing::debug!(issuer = %issuer, kid_count, "Issuer keyset refreshed");
                    #[cfg(feature = "metrics")]
                    crate::observability::record_key_refresh(issuer, true);
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        issuer = %issuer,
                        error = %e,
                        "Keyset refresh failed, keeping previous keys"
                    );
                    #[cfg(feature = "metrics")]
                    crate::observability::record_key_refresh(issuer, false);
                }
            }
        }
        failures
    }
}

async fn fetch_keyset(
    source: &dyn KeySource,
    config: &IssuerConfig,
    timeout: Duration,
) -> Result<Keyset> {
    let jwks = tokio::time::timeout(timeout, source.fetch(config))
        .await
        .map_err(|_| AuthError::KeyFetch {
            issuer: config.issuer.clone(),
            reason: format!("timed out after {timeout:?}"),
        })??;

    Keyset::from_jwk_set(&config.issuer, &jwks, config.algorithm)
}

/// Background keyset refresh task builder
pub struct KeyRefreshTask {
    registry: Arc<KeyRegistry>,
    interval: Duration,
}

impl std::fmt::Debug for KeyRefreshTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRefreshTask")
            .field("registry", &self.registry)
            .field("interval", &self.interval)
            .finish()
    }
}

impl KeyRefreshTask {
    #[must_use]
    pub const fn new(registry: Arc<KeyRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Run until `shutdown` is cancelled. The first refresh happens one
    /// interval after spawning since [`KeyRegistry::load`] just fetched.
    pub fn spawn(
        self,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.registry.refresh_all().await;
                    }
                    () = shutdown.cancelled() => {
                        tracing::debug!("Key refresh task shutting down");
                        break;
                    }
                }
            }
        })
    }
}
