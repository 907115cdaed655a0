mod bootstrap;
mod calls;
mod chat;
mod health;
#[cfg(test)]
mod support;
mod webhook;

use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;

use bootstrap::AppState;
use ringflow_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use ringflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/vapi/webhook", post(webhook::vapi_webhook))
        .route("/vapi/chat", post(chat::chat_completions))
        .route("/chat/completions", post(chat::chat_completions))
        .route("/call/initiate", post(calls::initiate_call))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let state = bootstrap::bootstrap_with_config(config)?;
    let address = format!("{}:{}", state.config.server.bind_address, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        llm_configured = state.config.llm.configured(),
        voice_configured = state.config.voice.configured(),
        calendar_service = %state.config.services.calendar_url,
        crm_service = %state.config.services.crm_url,
        workflows_service = %state.config.services.workflows_url,
        "orchestrator started"
    );

    axum::serve(listener, router(state)).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(event_name = "system.server.stopping", "orchestrator stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "shutdown signal listener failed");
    }
}
