//! Turnrelay Server - standalone entry point
//!
//! Thin wrapper around `turnrelay-api`. Configuration comes from the
//! environment: `NOTION_TOKEN`, `NOTION_DATABASE_ID`, `DATABASE_URL`,
//! `TURNRELAY_PORT` and friends.

use anyhow::{Context, Result};
use turnrelay_api::{RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    turnrelay_api::server::init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting turnrelay");

    let config = ServerConfig::from_env();

    let server = RelayServer::new(config)
        .await
        .context("failed to initialize server")?;

    server.run().await.context("server error")?;

    Ok(())
}
