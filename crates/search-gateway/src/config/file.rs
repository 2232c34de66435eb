//! TOML configuration file loading

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::builder::ConfigBuilder;
use crate::Result;
use crate::auth::{IssuerConfig, parse_algorithm};

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./search-gateway.toml",
    "~/.config/search-gateway/config.toml",
    "/etc/search-gateway/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn parse_url(value: &str, what: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| crate::Error::Config(format!("Invalid {what}: {e}")))
}

#[allow(clippy::too_many_lines)]
fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(server) = config.server {
        if let Some(host_str) = server.host {
            let host = host_str
                .parse::<IpAddr>()
                .map_err(|e| crate::Error::Config(format!("Invalid server.host: {e}")))?;
            builder = builder.http_host(host);
        }

        if let Some(port) = server.port {
            builder = builder.http_port(port);
        }

        if let Some(secs) = server.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        if let Some(limit) = server.body_limit_bytes {
            builder = builder.body_limit(limit);
        }
    }

    if let Some(backend) = config.backend {
        if let Some(url_str) = backend.url {
            builder = builder.backend_url(parse_url(&url_str, "backend URL")?);
        }

        if let Some(secs) = backend.timeout_secs {
            builder = builder.backend_timeout(Duration::from_secs(secs));
        }
    }

    if let Some(issuers) = config.issuers {
        let mut parsed = Vec::with_capacity(issuers.len());
        for entry in issuers {
            let jwks_url = parse_url(&entry.jwks_url, &format!("JWKS URL for {}", entry.issuer))?;
            let mut issuer = IssuerConfig::new(entry.issuer, jwks_url);
            if let Some(alg) = entry.algorithm {
                let alg =
                    parse_algorithm(&alg).map_err(|e| crate::Error::Config(e.to_string()))?;
                issuer = issuer.with_algorithm(alg);
            }
            parsed.push(issuer);
        }
        builder = builder.issuers(parsed);
    }

    if let Some(keys) = config.keys {
        if let Some(secs) = keys.refresh_interval_secs {
            builder = builder.key_refresh_interval(Duration::from_secs(secs));
        }

        if let Some(secs) = keys.fetch_timeout_secs {
            builder = builder.key_fetch_timeout(Duration::from_secs(secs));
        }

        if let Some(secs) = keys.clock_skew_secs {
            builder = builder.clock_skew(Duration::from_secs(secs));
        }
    }

    if let Some(auth) = config.auth {
        if let Some(header) = auth.credential_header {
            builder = builder.credential_header(header);
        }

        if let Some(username) = auth.admin_username {
            builder = builder.admin_username(username);
        }

        if let Some(hash) = auth.admin_password_hash {
            builder = builder.admin_password_hash(hash);
        }
    }

    if let Some(tenant) = config.tenant {
        if let Some(url_str) = tenant.service_url {
            builder = builder.tenant_service_url(parse_url(&url_str, "tenant service URL")?);
        }

        if let Some(doctype) = tenant.doctype {
            builder = builder.tenant_doctype(doctype);
        }

        if let Some(secs) = tenant.timeout_secs {
            builder = builder.tenant_timeout(Duration::from_secs(secs));
        }

        if let Some(key) = tenant.api_key {
            builder = builder.tenant_api_key(key);
        }

        if let Some(secret) = tenant.api_secret {
            builder = builder.tenant_api_secret(secret);
        }

        if let Some(fields) = tenant.excluded_fields {
            builder = builder.tenant_excluded_fields(fields);
        }
    }

    if let Some(rewrite) = config.rewrite {
        if let Some(field) = rewrite.time_field {
            builder = builder.time_field(field);
        }

        if let Some(suffix) = rewrite.search_path_suffix {
            builder = builder.search_path_suffix(suffix);
        }

        if let Some(paths) = rewrite.blocked_paths {
            builder = builder.blocked_paths(paths);
        }
    }

    if let Some(obs) = config.observability {
        if let Some(endpoint) = obs.otlp_endpoint {
            builder = builder.otlp_endpoint(Some(endpoint));
        }

        if let Some(name) = obs.service_name {
            builder = builder.service_name(name);
        }

        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    server: Option<ServerFileConfig>,
    backend: Option<BackendFileConfig>,
    issuers: Option<Vec<IssuerFileConfig>>,
    keys: Option<KeysFileConfig>,
    auth: Option<AuthFileConfig>,
    tenant: Option<TenantFileConfig>,
    rewrite: Option<RewriteFileConfig>,
    observability: Option<ObservabilityFileConfig>,
}

#[derive(Debug, Deserialize)]
struct ServerFileConfig {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
    body_limit_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct BackendFileConfig {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct IssuerFileConfig {
    issuer: String,
    jwks_url: String,
    algorithm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeysFileConfig {
    refresh_interval_secs: Option<u64>,
    fetch_timeout_secs: Option<u64>,
    clock_skew_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct AuthFileConfig {
    credential_header: Option<String>,
    admin_username: Option<String>,
    admin_password_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TenantFileConfig {
    service_url: Option<String>,
    doctype: Option<String>,
    timeout_secs: Option<u64>,
    api_key: Option<String>,
    api_secret: Option<String>,
    excluded_fields: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RewriteFileConfig {
    time_field: Option<String>,
    search_path_suffix: Option<String>,
    blocked_paths: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityFileConfig {
    otlp_endpoint: Option<String>,
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}
