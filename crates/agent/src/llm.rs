use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use ringflow_core::config::LlmConfig;
use ringflow_core::transcript::{ContentBlock, Message};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One tool declaration submitted alongside every model request.
#[derive(Clone, Debug, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub tools: Vec<ToolDefinition>,
    pub messages: Vec<Message>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
}

impl ModelResponse {
    pub fn requests_tools(&self) -> bool {
        matches!(self.stop_reason, Some(StopReason::ToolUse))
    }

    /// Concatenated text across all text blocks of the response.
    pub fn text(&self) -> String {
        let mut combined = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                combined.push_str(text);
            }
        }
        combined
    }

    /// The tool invocations requested by this response, in emission order.
    pub fn tool_invocations(&self) -> Vec<(String, String, Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.clone(), name.clone(), input.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm api key is not configured")]
    MissingCredential,
    #[error("llm request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("llm returned an unexpected payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("llm returned status {status}: {detail}")]
    Status { status: u16, detail: String },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelResponse, LlmError>;
}

/// Live client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelResponse, LlmError> {
        let api_key = self.api_key.as_ref().ok_or(LlmError::MissingCredential)?;

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                detail: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
