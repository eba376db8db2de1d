use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod daemon;
mod device;
mod state;
mod token;
mod types;

#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::daemon::TokenDaemon;

#[derive(Debug, Parser)]
#[command(name = "devtoken-daemon", version, about = "Serves a hardware-bound device token on localhost")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("devtoken_daemon=debug,info")),
        )
        .init();

    let args = Args::parse();

    info!("🚀 Device token daemon starting...");

    // ========================================
    // Phase 1: Configuration
    // ========================================
    info!("📝 Phase 1: Configuration");

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let mut config = match Config::load_or_default(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    config.apply_env_overrides();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("  Issuer: {}", config.issuer.url);
    info!("  Device ID source: {}", config.identity.device_id.as_str());
    info!("  Response field: {}", config.response.token_field.as_str());

    // ========================================
    // Phase 2: Machine Identity
    // ========================================
    info!("🔍 Phase 2: Machine Identity");

    let daemon = TokenDaemon::new(config)?;
    info!("  Platform: {}", daemon.context().platform());
    daemon.prime_identity().await;

    // ========================================
    // Phase 3: Token Server
    // ========================================
    info!("🌐 Phase 3: Token Server");

    daemon.run().await
}
