use anyhow::Result;
use tracing::info;

use ringflow_core::config::{AppConfig, LoadOptions};
use ringflow_mcp::calendar;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    ringflow_mcp::init_logging(&config.logging);

    let api = calendar::select_api(&config.calendar)?;

    if config.calendar.configured() {
        info!("Cal.com API key configured");
    } else {
        info!("Cal.com API key not set - running in mock mode");
    }

    let address = format!("{}:{}", config.server.bind_address, config.server.calendar_port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(bind_address = %address, "mcp-calendar started");

    axum::serve(listener, calendar::router(api)).await?;
    Ok(())
}
