use std::io::BufRead;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use search_gateway::GatewayState;
use search_gateway::auth::{
    HttpKeySource, IssuerConfig, KeyRefreshTask, KeyRegistry, hash_password,
};
use search_gateway::config::{self, Config, ConfigBuilder};
use search_gateway::observability::{init_observability, shutdown_observability};
use search_gateway::transport::run_http;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "search-gateway")]
#[command(about = "Tenant-scoping authentication gateway for a shared log search engine", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP bind host
    #[arg(long)]
    http_host: Option<IpAddr>,

    /// HTTP bind port
    #[arg(long)]
    http_port: Option<u16>,

    /// Search backend base URL
    #[arg(long)]
    backend_url: Option<Url>,

    /// Trusted issuer as `issuer=jwks_url` (repeatable)
    #[arg(long = "issuer")]
    issuers: Vec<String>,

    /// Tenant-metadata service base URL
    #[arg(long)]
    tenant_url: Option<Url>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a `salt$hexdigest` admin password hash
    HashPassword {
        /// Salt mixed into the digest
        #[arg(long)]
        salt: String,

        /// Password to hash; read from stdin when omitted
        #[arg(long, env = "GATEWAY_ADMIN_PASSWORD")]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Some(Command::HashPassword {
        ref salt,
        ref password,
    }) = args.command
    {
        let password = match password {
            Some(p) => p.clone(),
            None => read_password_line()?,
        };
        println!("{}", hash_password(salt, &password));
        return Ok(());
    }

    // Precedence: env > file > CLI > defaults
    let base = cli_builder(&args)?;
    let config = config::load_config(args.config.as_deref(), base)?.build()?;

    init_observability(&config.observability)?;

    let result = run(config).await;

    shutdown_observability();

    result
}

fn cli_builder(args: &Args) -> anyhow::Result<ConfigBuilder> {
    let mut builder = ConfigBuilder::new().json_logs(args.json_logs);

    if let Some(host) = args.http_host {
        builder = builder.http_host(host);
    }

    if let Some(port) = args.http_port {
        builder = builder.http_port(port);
    }

    if let Some(ref url) = args.backend_url {
        builder = builder.backend_url(url.clone());
    }

    for pair in &args.issuers {
        let issuer = IssuerConfig::parse_pair(pair)
            .map_err(|e| anyhow::anyhow!("Invalid --issuer: {e}"))?;
        builder = builder.add_issuer(issuer);
    }

    if let Some(ref url) = args.tenant_url {
        builder = builder.tenant_service_url(url.clone());
    }

    if args.verbose {
        builder = builder.log_level("debug".to_string());
    }

    Ok(builder)
}

fn read_password_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let key_source = Arc::new(HttpKeySource::new(config.keys.fetch_timeout)?);
    let registry = KeyRegistry::load(
        config.keys.issuers.clone(),
        key_source,
        config.keys.fetch_timeout,
    )
    .await
    .context("Failed to load issuer keys")?;
    let registry = Arc::new(registry);

    let state = GatewayState::from_config(&config, Arc::clone(&registry))?;

    tracing::info!("Starting search gateway");
    tracing::info!("Backend: {}", config.backend.url);
    tracing::info!("Tenant service: {}", config.tenant.service_url);
    tracing::info!("Trusted issuers: {}", config.keys.issuers.len());
    tracing::info!("Key refresh interval: {:?}", config.keys.refresh_interval);
    tracing::info!("Credential header: {}", config.auth.credential_header);
    tracing::info!("Admin bypass enabled: {}", config.auth.admin.is_some());

    let cancel = CancellationToken::new();
    let refresh = KeyRefreshTask::new(registry, config.keys.refresh_interval).spawn(cancel.clone());

    let signal_token = cancel.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {e}");
            signal_token.cancelled().await;
        }
        tracing::info!("Shutdown signal received");
    };

    let result = run_http(state, &config.server, shutdown).await;

    cancel.cancel();
    if let Err(e) = refresh.await {
        tracing::warn!("Key refresh task ended abnormally: {e}");
    }

    result.map_err(Into::into)
}
