//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use super::builder::ConfigBuilder;
use crate::Result;
use crate::auth::IssuerConfig;

/// Environment variable names
mod vars {
    pub const GATEWAY_HTTP_HOST: &str = "GATEWAY_HTTP_HOST";
    pub const GATEWAY_HTTP_PORT: &str = "GATEWAY_HTTP_PORT";
    pub const GATEWAY_BODY_LIMIT_BYTES: &str = "GATEWAY_BODY_LIMIT_BYTES";
    pub const GATEWAY_BACKEND_URL: &str = "GATEWAY_BACKEND_URL";
    pub const GATEWAY_BACKEND_TIMEOUT_SECS: &str = "GATEWAY_BACKEND_TIMEOUT_SECS";
    pub const GATEWAY_ISSUERS: &str = "GATEWAY_ISSUERS";
    pub const GATEWAY_KEY_REFRESH_SECS: &str = "GATEWAY_KEY_REFRESH_SECS";
    pub const GATEWAY_CLOCK_SKEW_SECS: &str = "GATEWAY_CLOCK_SKEW_SECS";
    pub const GATEWAY_CREDENTIAL_HEADER: &str = "GATEWAY_CREDENTIAL_HEADER";
    pub const GATEWAY_ADMIN_USERNAME: &str = "GATEWAY_ADMIN_USERNAME";
    pub const GATEWAY_ADMIN_PASSWORD_HASH: &str = "GATEWAY_ADMIN_PASSWORD_HASH";
    pub const GATEWAY_TENANT_SERVICE_URL: &str = "GATEWAY_TENANT_SERVICE_URL";
    pub const GATEWAY_TENANT_API_KEY: &str = "GATEWAY_TENANT_API_KEY";
    pub const GATEWAY_TENANT_API_SECRET: &str = "GATEWAY_TENANT_API_SECRET";
    pub const GATEWAY_TIME_FIELD: &str = "GATEWAY_TIME_FIELD";
    pub const GATEWAY_BLOCKED_PATHS: &str = "GATEWAY_BLOCKED_PATHS";
    pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
    pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const GATEWAY_JSON_LOGS: &str = "GATEWAY_JSON_LOGS";
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(host_str) = env::var(vars::GATEWAY_HTTP_HOST)
        && let Ok(host) = host_str.parse::<IpAddr>()
    {
        builder = builder.http_host(host);
    }

    if let Ok(port_str) = env::var(vars::GATEWAY_HTTP_PORT)
        && let Ok(port) = port_str.parse::<u16>()
    {
        builder = builder.http_port(port);
    }

    if let Ok(limit_str) = env::var(vars::GATEWAY_BODY_LIMIT_BYTES)
        && let Ok(limit) = limit_str.parse::<usize>()
    {
        builder = builder.body_limit(limit);
    }

    // Backend
    if let Ok(url_str) = env::var(vars::GATEWAY_BACKEND_URL) {
        let url = Url::parse(&url_str).map_err(|e| {
            crate::Error::Config(format!("Invalid {}: {}", vars::GATEWAY_BACKEND_URL, e))
        })?;
        builder = builder.backend_url(url);
    }

    if let Ok(timeout_str) = env::var(vars::GATEWAY_BACKEND_TIMEOUT_SECS)
        && let Ok(secs) = timeout_str.parse::<u64>()
    {
        builder = builder.backend_timeout(Duration::from_secs(secs));
    }

    // Issuers and keys
    if let Ok(issuers_str) = env::var(vars::GATEWAY_ISSUERS) {
        builder = builder.issuers(parse_issuers(&issuers_str)?);
    }

    if let Ok(refresh_str) = env::var(vars::GATEWAY_KEY_REFRESH_SECS)
        && let Ok(secs) = refresh_str.parse::<u64>()
    {
        builder = builder.key_refresh_interval(Duration::from_secs(secs));
    }

    if let Ok(skew_str) = env::var(vars::GATEWAY_CLOCK_SKEW_SECS)
        && let Ok(secs) = skew_str.parse::<u64>()
    {
        builder = builder.clock_skew(Duration::from_secs(secs));
    }

    // Caller credentials
    if let Ok(header) = env::var(vars::GATEWAY_CREDENTIAL_HEADER) {
        builder = builder.credential_header(header);
    }

    if let Ok(username) = env::var(vars::GATEWAY_ADMIN_USERNAME) {
        builder = builder.admin_username(username);
    }

    if let Ok(hash) = env::var(vars::GATEWAY_ADMIN_PASSWORD_HASH) {
        builder = builder.admin_password_hash(hash);
    }

    // Tenant service
    if let Ok(url_str) = env::var(vars::GATEWAY_TENANT_SERVICE_URL) {
        let url = Url::parse(&url_str).map_err(|e| {
            crate::Error::Config(format!(
                "Invalid {}: {}",
                vars::GATEWAY_TENANT_SERVICE_URL,
                e
            ))
        })?;
        builder = builder.tenant_service_url(url);
    }

    if let Ok(key) = env::var(vars::GATEWAY_TENANT_API_KEY) {
        builder = builder.tenant_api_key(key);
    }

    if let Ok(secret) = env::var(vars::GATEWAY_TENANT_API_SECRET) {
        builder = builder.tenant_api_secret(secret);
    }

    // Rewriting
    if let Ok(field) = env::var(vars::GATEWAY_TIME_FIELD) {
        builder = builder.time_field(field);
    }

    if let Ok(paths_str) = env::var(vars::GATEWAY_BLOCKED_PATHS) {
        let paths: Vec<String> = paths_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        builder = builder.blocked_paths(paths);
    }

    // Observability
    if let Ok(endpoint) = env::var(vars::OTEL_EXPORTER_OTLP_ENDPOINT) {
        builder = builder.otlp_endpoint(Some(endpoint));
    }

    if let Ok(name) = env::var(vars::OTEL_SERVICE_NAME) {
        builder = builder.service_name(name);
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::GATEWAY_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

/// Parse a comma-separated `issuer=jwks_url` list
fn parse_issuers(value: &str) -> Result<Vec<IssuerConfig>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            IssuerConfig::parse_pair(pair).map_err(|e| {
                crate::Error::Config(format!("Invalid {}: {}", vars::GATEWAY_ISSUERS, e))
            })
        })
        .collect()
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
