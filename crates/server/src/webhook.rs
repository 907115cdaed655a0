//! Inbound webhook from the voice provider.
//!
//! One endpoint, dispatching on the `message.type` discriminator:
//! - `assistant-request`   — answer the assistant configuration
//! - `function-call`       — synchronous tool RPC, bypassing the turn driver
//! - `end-of-call-report`  — discard the session, trigger post-call workflow
//! - anything else         — acknowledged and ignored

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use ringflow_agent::prompt;
use ringflow_vapi::events::{assistant_config, parse_webhook, VapiEvent};

use crate::bootstrap::AppState;

pub async fn vapi_webhook(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<Value> {
    let event = parse_webhook(&payload);
    debug!(event_type = event.event_type(), "webhook event received");

    match event {
        VapiEvent::AssistantRequest => {
            let first_message = prompt::first_message(None);
            Json(assistant_config(&state.config.voice, &state.config.llm.model, &first_message))
        }
        VapiEvent::FunctionCall { name, parameters } => {
            let result = state.tools.execute(&name, &parameters).await;
            Json(json!({"result": result}))
        }
        VapiEvent::EndOfCallReport { call_id, payload } => {
            let existed = state.sessions.end(&call_id);
            info!(call_id = %call_id, existed, "call ended; session discarded");
            spawn_outcome_notification(&state, call_id, payload);
            Json(json!({"status": "received"}))
        }
        VapiEvent::Unsupported { event_type } => {
            debug!(event_type = %event_type, "ignoring unsupported webhook event");
            Json(json!({"status": "received"}))
        }
    }
}

/// Best-effort post-call workflow trigger. The webhook response does not wait
/// on it, and failures are logged and swallowed.
fn spawn_outcome_notification(state: &AppState, call_id: String, payload: Value) {
    let http = state.http.clone();
    let url = format!(
        "{}/tools/log_call_outcome",
        state.config.services.workflows_url.trim_end_matches('/')
    );

    tokio::spawn(async move {
        let body = json!({"call_id": call_id.as_str(), "payload": payload});
        match http.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(
                    call_id = %call_id,
                    status = response.status().as_u16(),
                    "post-call workflow answered non-success"
                );
            }
            Err(error) => {
                warn!(call_id = %call_id, error = %error, "post-call workflow trigger failed");
            }
        }
    });
}
