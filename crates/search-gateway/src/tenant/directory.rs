//! Cached principal → tenant record resolution
//!
//! Entries live for the whole process: once a principal resolves, later
//! lookups never reach the service again. Concurrent misses for the same
//! principal are not coalesced, so first access under load may call the
//! service more than once; the last insert wins and all results are
//! equivalent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::error::{Result, TenantError};
use super::record::TenantRecord;
use super::source::TenantSource;

pub struct TenantDirectory {
    source: Arc<dyn TenantSource>,
    cache: RwLock<HashMap<String, Arc<TenantRecord>>>,
    timeout: Duration,
}

impl std::fmt::Debug for TenantDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantDirectory")
            .field("cached", &self.cache.read().len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TenantDirectory {
    #[must_use]
    pub fn new(source: Arc<dyn TenantSource>, timeout: Duration) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Resolve `principal`, consulting the service only on a cache miss.
    pub async fn lookup(&self, credential: &str, principal: &str) -> Result<Arc<TenantRecord>> {
        if let Some(record) = self.cached(principal) {
            tracing::trace!(principal, "Tenant cache hit");
            #[cfg(feature = "metrics")]
            crate::observability::record_tenant_cache(true);
            return Ok(record);
        }

        #[cfg(feature = "metrics")]
        crate::observability::record_tenant_cache(false);

        let record = tokio::time::timeout(self.timeout, self.source.fetch(credential, principal))
            .await
            .map_err(|_| TenantError::Timeout(self.timeout))??;
        let record = Arc::new(record);

        tracing::debug!(
            principal,
            attributes = record.len(),
            "Tenant record resolved"
        );

        self.cache
            .write()
            .insert(principal.to_string(), Arc::clone(&record));
        Ok(record)
    }

    #[must_use]
    pub fn cached(&self, principal: &str) -> Option<Arc<TenantRecord>> {
        self.cache.read().get(principal).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}
