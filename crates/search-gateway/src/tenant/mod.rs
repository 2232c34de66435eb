//! Tenant resolution
//!
//! Maps an authenticated principal to the attribute record that scopes its
//! searches. Records come from an external metadata service
//! ([`HttpTenantSource`]) and are cached for the life of the process by
//! [`TenantDirectory`].

mod config;
mod directory;
mod error;
mod record;
mod source;

pub use config::{DEFAULT_DOCTYPE, DEFAULT_TENANT_TIMEOUT, TenantConfig};
pub use directory::TenantDirectory;
pub use error::{Result, TenantError};
pub use record::{EXCLUDED_FIELDS, TenantRecord};
pub use source::{HttpTenantSource, TenantSource};
