//! # Banter Issuer
//!
//! Token issuance service for Banter room chat. Mints short-lived, scoped
//! broker credentials for anonymous clients so the long-lived broker API
//! key never leaves the server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings (key from the environment)
//! BANTER_BROKER_API_KEY=sk_... banter-issuer
//!
//! # Run with custom config
//! banter-issuer   # reads banter.toml / /etc/banter/banter.toml
//!
//! # Run with environment variables
//! BANTER_PORT=8080 BANTER_HOST=0.0.0.0 banter-issuer
//! ```

mod config;
mod handlers;
mod issuer;
mod metrics;
mod signer;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(
        "Starting Banter issuer on {}:{} (room {})",
        config.host,
        config.port,
        config.room.channel
    );

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
