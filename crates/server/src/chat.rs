//! OpenAI-compatible chat surface called back by the voice provider.
//!
//! `POST /vapi/chat` and `POST /chat/completions` accept the usual
//! `{model, messages[], stream, ...}` envelope. The model itself is not
//! streamed; when `stream=true` the finished reply is replayed as
//! `chat.completion.chunk` frames terminated by a literal `[DONE]` line.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use ringflow_agent::prompt;
use ringflow_core::transcript::Transcript;

use crate::bootstrap::AppState;

/// Spoken when the provider sends a turn with no usable user utterance.
const EMPTY_TURN_REPLY: &str = "I didn't catch that. Could you repeat?";

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Value>,
    #[serde(default)]
    pub stream: bool,
    /// Provider call object; carries the call id and lead metadata.
    #[serde(default)]
    pub call: Value,
}

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    let call_id = request.call["id"].as_str().unwrap_or("unknown").to_string();
    let model = request.model.clone().unwrap_or_else(|| state.config.llm.model.clone());

    let user_text = latest_user_message(&request.messages);
    let reply = if user_text.is_empty() {
        debug!(call_id = %call_id, "chat turn without a user utterance");
        EMPTY_TURN_REPLY.to_string()
    } else {
        let shared = state.sessions.transcript(&call_id);
        let mut transcript = shared.lock().await;
        if transcript.is_empty() {
            seed_lead_context(&mut transcript, &request.call);
        }
        state.driver.advance_turn(&mut transcript, &user_text).await
    };

    let completion_id = format!("chatcmpl-{}", Uuid::new_v4().simple());
    let created = Utc::now().timestamp();

    if request.stream {
        (
            [(header::CONTENT_TYPE, "text/event-stream")],
            sse_body(&completion_id, created, &model, &reply),
        )
            .into_response()
    } else {
        Json(completion_envelope(&completion_id, created, &model, &reply)).into_response()
    }
}

/// The newest inbound user utterance, or empty if the turn carries none.
fn latest_user_message(messages: &[Value]) -> String {
    messages
        .iter()
        .rev()
        .find(|message| message["role"].as_str() == Some("user"))
        .and_then(|message| message["content"].as_str())
        .unwrap_or("")
        .to_string()
}

/// Seed a fresh transcript with the lead briefing when the provider's call
/// object carries lead metadata from call initiation.
fn seed_lead_context(transcript: &mut Transcript, call: &Value) {
    let metadata = &call["metadata"];
    let name = call["customer"]["name"].as_str();
    let company = metadata["company_name"].as_str();
    let lead_id = metadata["lead_id"].as_str();

    if name.is_none() && company.is_none() && lead_id.is_none() {
        return;
    }

    transcript.push_user_text(prompt::lead_context(name, company, lead_id));
    transcript.push_assistant_text(prompt::LEAD_CONTEXT_ACK);
}

fn completion_envelope(id: &str, created: i64, model: &str, reply: &str) -> Value {
    json!({
        "id": id,
        "object": "chat.completion",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply},
            "finish_reason": "stop"
        }]
    })
}

/// Replay a finished reply as an SSE stream: a role opener, one content chunk
/// per word, a stop chunk, then the `[DONE]` sentinel. Concatenating the
/// `delta.content` values reproduces the reply byte for byte.
fn sse_body(id: &str, created: i64, model: &str, reply: &str) -> String {
    let mut body = String::new();
    let mut frame = |chunk: &Value| {
        body.push_str("data: ");
        body.push_str(&chunk.to_string());
        body.push_str("\n\n");
    };

    frame(&chunk_envelope(id, created, model, json!({"role": "assistant"}), None));
    for piece in reply.split_inclusive(' ') {
        frame(&chunk_envelope(id, created, model, json!({"content": piece}), None));
    }
    frame(&chunk_envelope(id, created, model, json!({}), Some("stop")));

    body.push_str("data: [DONE]\n\n");
    body
}

fn chunk_envelope(
    id: &str,
    created: i64,
    model: &str,
    delta: Value,
    finish_reason: Option<&str>,
) -> Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": delta,
            "finish_reason": finish_reason
        }]
    })
}
