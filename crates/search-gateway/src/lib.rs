//! Tenant-scoping authentication gateway for a shared log search engine
//!
//! Callers present a signed identity token. The gateway verifies it against
//! the issuer's published keys, resolves the caller's tenant record and
//! injects the record's attributes as mandatory filters into search
//! submissions before forwarding them to the search backend.

pub mod auth;
pub mod config;
mod error;
pub mod gateway;
pub mod observability;
pub mod rewrite;
pub mod tenant;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use config::{Config, ConfigBuilder, ObservabilityConfig};
pub use error::{Error, Result};
pub use gateway::{GatewayError, GatewayState};
pub use rewrite::QueryRewriter;
