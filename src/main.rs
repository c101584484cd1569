//! clouddns-webhook binary
//!
//! Loads configuration, authenticates with Rackspace Identity and serves the
//! external-dns webhook until SIGTERM or Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clouddns_webhook::clouddns::RackspaceAuthenticator;
use clouddns_webhook::config::Config;
use clouddns_webhook::credentials::CredentialCache;
use clouddns_webhook::provider::CloudDnsProvider;
use clouddns_webhook::server;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

//==============================================================================
// Main
//==============================================================================

#[derive(Debug, Parser)]
#[command(name = "clouddns-webhook")]
#[command(version = VERSION)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config).context("Config load failed")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting clouddns-webhook {}", VERSION);
    info!("Identity endpoint: {}", config.identity_endpoint);

    let authenticator = RackspaceAuthenticator::new(
        &config.identity_endpoint,
        &config.username,
        &config.api_key,
        config.tenant_id.as_deref(),
        config.timeout,
    )
    .context("HTTP client failed")?;

    let credentials = CredentialCache::new(Arc::new(authenticator))
        .await
        .context("Failed to authenticate with Rackspace")?;

    let provider = CloudDnsProvider::new(
        Arc::new(credentials),
        config.domain_filter(),
        config.dry_run,
    );

    let addr = config.listen_addr()?;
    server::serve(addr, Arc::new(provider), server::shutdown_signal()).await
}
