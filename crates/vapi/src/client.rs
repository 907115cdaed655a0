use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

use ringflow_core::config::VoiceConfig;

const OUTBOUND_TIMEOUT_SECS: u64 = 30;

/// Request to start an outbound call to a lead.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundCall {
    pub lead_id: String,
    pub phone_number: String,
    pub lead_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum VapiError {
    #[error("voice api key is not configured")]
    MissingCredential,
    #[error("voice api request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("voice api returned status {status}: {detail}")]
    Status { status: u16, detail: String },
}

/// Outbound client for the voice provider's call API.
pub struct VapiClient {
    http: Client,
    api_key: Option<SecretString>,
    phone_number_id: Option<String>,
    base_url: String,
}

impl VapiClient {
    pub fn from_config(voice: &VoiceConfig) -> Result<Self, VapiError> {
        let http = Client::builder().timeout(Duration::from_secs(OUTBOUND_TIMEOUT_SECS)).build()?;
        Ok(Self {
            http,
            api_key: voice.api_key.clone(),
            phone_number_id: voice.phone_number_id.clone(),
            base_url: voice.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn configured(&self) -> bool {
        self.api_key.as_ref().map(|key| !key.expose_secret().trim().is_empty()).unwrap_or(false)
    }

    /// Place the call. `assistant` is the same configuration object answered
    /// to `assistant-request`, inlined so the provider needs no second trip.
    ///
    /// This is the one hard dependency in the system: without a credential it
    /// fails fast instead of degrading to a mock.
    pub async fn initiate_call(
        &self,
        call: &OutboundCall,
        assistant: Value,
    ) -> Result<Value, VapiError> {
        let api_key = self.api_key.as_ref().ok_or(VapiError::MissingCredential)?;

        let body = call_body(call, self.phone_number_id.as_deref(), assistant);
        let response = self
            .http
            .post(format!("{}/call/phone", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(VapiError::Status { status: status.as_u16(), detail });
        }

        Ok(response.json::<Value>().await?)
    }
}

fn call_body(call: &OutboundCall, phone_number_id: Option<&str>, assistant: Value) -> Value {
    json!({
        "phoneNumberId": phone_number_id,
        "customer": {
            "number": call.phone_number,
            "name": call.lead_name
        },
        "assistant": assistant["assistant"],
        "metadata": {
            "lead_id": call.lead_id,
            "company_name": call.company_name
        }
    })
}
