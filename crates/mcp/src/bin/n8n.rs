use anyhow::Result;
use tracing::info;

use ringflow_core::config::{AppConfig, LoadOptions};
use ringflow_mcp::n8n;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    ringflow_mcp::init_logging(&config.logging);

    let trigger = n8n::select_trigger(&config.workflows)?;

    if config.workflows.configured() {
        info!("n8n webhook base URL configured");
    } else {
        info!("n8n webhook base URL not set - running in mock mode");
    }

    let address = format!("{}:{}", config.server.bind_address, config.server.workflows_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(bind_address = %address, "mcp-n8n started");

    axum::serve(listener, n8n::router(trigger)).await?;
    Ok(())
}
