use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::info;

use ringflow_agent::llm::{AnthropicClient, LlmError};
use ringflow_agent::tools::{HttpToolExecutor, ServiceTargets, ToolExecution};
use ringflow_agent::turn::TurnDriver;
use ringflow_core::config::AppConfig;
use ringflow_core::session::{InMemorySessionStore, SessionStore};
use ringflow_vapi::client::{VapiClient, VapiError};

/// Everything the handlers share. Cheap to clone; axum hands a copy to each
/// request task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub driver: Arc<TurnDriver>,
    pub tools: Arc<dyn ToolExecution>,
    pub vapi: Arc<VapiClient>,
    /// Client for fire-and-forget collaborator calls outside the tool path.
    pub http: Client,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("llm client construction failed: {0}")]
    Llm(#[from] LlmError),
    #[error("voice client construction failed: {0}")]
    Voice(#[from] VapiError),
    #[error("http client construction failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Wire the orchestrator components from an already-loaded configuration.
///
/// Construction never reaches the network; missing credentials surface later,
/// at the first call that needs them.
pub fn bootstrap_with_config(config: AppConfig) -> Result<AppState, BootstrapError> {
    let collaborator_timeout = Duration::from_secs(config.services.timeout_secs);

    let llm = Arc::new(AnthropicClient::from_config(&config.llm)?);
    let tools: Arc<dyn ToolExecution> = Arc::new(HttpToolExecutor::new(
        ServiceTargets::from_config(&config.services),
        collaborator_timeout,
    )?);
    let driver = Arc::new(TurnDriver::new(llm, tools.clone(), &config.llm));
    let vapi = Arc::new(VapiClient::from_config(&config.voice)?);
    let http = Client::builder().timeout(collaborator_timeout).build()?;

    info!(
        event_name = "system.bootstrap.ready",
        llm_configured = config.llm.configured(),
        voice_configured = config.voice.configured(),
        "orchestrator components wired"
    );

    Ok(AppState {
        config: Arc::new(config),
        sessions: Arc::new(InMemorySessionStore::new()),
        driver,
        tools,
        vapi,
        http,
    })
}
