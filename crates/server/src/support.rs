//! Scripted fakes and state builders shared by the handler tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use ringflow_agent::llm::{ChatRequest, LlmClient, LlmError, ModelResponse, StopReason};
use ringflow_agent::tools::ToolExecution;
use ringflow_agent::turn::TurnDriver;
use ringflow_core::config::AppConfig;
use ringflow_core::session::InMemorySessionStore;
use ringflow_core::transcript::ContentBlock;
use ringflow_vapi::client::VapiClient;

use crate::bootstrap::AppState;

/// Model fake that answers a fixed sequence of plain-text replies, then
/// errors once the script runs out.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<ModelResponse>>,
}

impl ScriptedLlm {
    pub fn replying(texts: &[&str]) -> Arc<Self> {
        let responses = texts
            .iter()
            .map(|text| ModelResponse {
                content: vec![ContentBlock::Text { text: (*text).to_string() }],
                stop_reason: Some(StopReason::EndTurn),
            })
            .collect();
        Arc::new(Self { responses: Mutex::new(responses) })
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: &ChatRequest) -> Result<ModelResponse, LlmError> {
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or(LlmError::Status { status: 500, detail: "script exhausted".to_string() })
    }
}

/// Executor fake that records every invocation and answers a fixed outcome.
pub struct RecordingExecutor {
    outcome: String,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingExecutor {
    pub fn with_outcome(outcome: &str) -> Arc<Self> {
        Arc::new(Self { outcome: outcome.to_string(), calls: Mutex::new(Vec::new()) })
    }

    pub fn recorded_calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ToolExecution for RecordingExecutor {
    async fn execute(&self, name: &str, arguments: &Value) -> String {
        self.calls.lock().expect("calls lock").push((name.to_string(), arguments.clone()));
        self.outcome.clone()
    }
}

pub fn app_state(llm: Arc<dyn LlmClient>, tools: Arc<dyn ToolExecution>) -> AppState {
    app_state_with_config(AppConfig::default(), llm, tools)
}

pub fn app_state_with_config(
    config: AppConfig,
    llm: Arc<dyn LlmClient>,
    tools: Arc<dyn ToolExecution>,
) -> AppState {
    let driver = Arc::new(TurnDriver::new(llm, tools.clone(), &config.llm));
    let vapi = Arc::new(VapiClient::from_config(&config.voice).expect("vapi client"));

    AppState {
        config: Arc::new(config),
        sessions: Arc::new(InMemorySessionStore::new()),
        driver,
        tools,
        vapi,
        http: reqwest::Client::new(),
    }
}
