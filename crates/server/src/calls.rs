use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use ringflow_agent::prompt;
use ringflow_vapi::client::{OutboundCall, VapiError};
use ringflow_vapi::events::assistant_config;

use crate::bootstrap::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    #[serde(default)]
    pub lead_id: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub lead_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

/// Start an outbound call to a lead. The one endpoint allowed to answer 500:
/// placing a call is a hard dependency on the voice provider, so a missing
/// credential fails fast instead of degrading.
pub async fn initiate_call(
    State(state): State<AppState>,
    Json(request): Json<InitiateCallRequest>,
) -> (StatusCode, Json<Value>) {
    let call = OutboundCall {
        lead_id: request.lead_id,
        phone_number: request.phone_number,
        lead_name: request.lead_name,
        company_name: request.company_name,
    };
    let first_message = prompt::first_message(call.lead_name.as_deref());
    let assistant = assistant_config(&state.config.voice, &state.config.llm.model, &first_message);

    match state.vapi.initiate_call(&call, assistant).await {
        Ok(response) => {
            info!(lead_id = %call.lead_id, "outbound call placed");
            (StatusCode::OK, Json(response))
        }
        Err(VapiError::MissingCredential) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "voice api key is not configured"})),
        ),
        Err(error) => {
            error!(lead_id = %call.lead_id, error = %error, "call initiation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": format!("failed to initiate call: {error}")})),
            )
        }
    }
}
