use crate::api::router;
use crate::config::Config;
use crate::state::AppContext;
use anyhow::{Context, Result};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct TokenDaemon {
    config: Config,
    context: AppContext,
}

impl TokenDaemon {
    pub fn new(config: Config) -> Result<Self> {
        let context = AppContext::from_config(&config)?;
        Ok(Self::with_context(config, context))
    }

    pub fn with_context(config: Config, context: AppContext) -> Self {
        Self { config, context }
    }

    pub fn context(&self) -> AppContext {
        self.context.clone()
    }

    /// Resolve the machine identity before accepting requests.
    ///
    /// A failure here is not fatal; handlers retry resolution on demand.
    pub async fn prime_identity(&self) {
        match self.context.identity.resolve().await {
            Ok(identity) => {
                info!("  ✓ MAC Address: {}", identity.mac_address);
                info!(
                    "  ✓ Serial Number: {}",
                    identity.serial_number.as_deref().unwrap_or("-")
                );
            }
            Err(e) => {
                warn!("⚠️  Identity resolution failed at startup: {}", e);
                warn!("   Will retry on the first token request");
            }
        }
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        self.serve(listener, shutdown_signal()).await
    }

    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let app = router(self.context, &self.config.server.allowed_origins);

        info!("🚀 Token server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        info!("Token server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
