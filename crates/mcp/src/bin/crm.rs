use anyhow::Result;
use tracing::info;

use ringflow_core::config::{AppConfig, LoadOptions};
use ringflow_mcp::crm;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    ringflow_mcp::init_logging(&config.logging);

    let api = crm::select_api(&config.crm)?;

    if config.crm.configured() {
        info!("HubSpot access token configured");
    } else {
        info!("HubSpot access token not set - running in mock mode");
    }

    let address = format!("{}:{}", config.server.bind_address, config.server.crm_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(bind_address = %address, "mcp-crm started");

    axum::serve(listener, crm::router(api)).await?;
    Ok(())
}
