//! Auto Ledger Frontend Server
//!
//! Entry point: load configuration, initialise logging, serve.

use std::sync::Arc;

use auto_ledger_frontend::{config::AppConfig, server, telemetry};
use dotenvy::dotenv;
use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let config = AppConfig::load()?;
    telemetry::init(&config.logging);

    tracing::info!(
        name: "config.loaded",
        port = config.server.port,
        backend_url = %config.proxy.backend_url,
        identity_enabled = config.identity.enabled,
        "Configuration loaded"
    );

    server::start_server(Arc::new(config)).await
}
