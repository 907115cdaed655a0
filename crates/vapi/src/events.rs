use serde_json::{json, Value};

use ringflow_core::config::VoiceConfig;

/// Inbound webhook events, discriminated by `message.type`.
///
/// The set is closed on purpose: routing is an exhaustive match, and any tag
/// this system does not act on lands in `Unsupported` and gets acknowledged
/// with a no-op success response.
#[derive(Clone, Debug, PartialEq)]
pub enum VapiEvent {
    /// Provider asks for the assistant configuration before starting a call.
    AssistantRequest,
    /// Synchronous tool RPC issued by the provider mid-call.
    FunctionCall { name: String, parameters: Value },
    /// The call ended; `payload` is the full report for downstream workflows.
    EndOfCallReport { call_id: String, payload: Value },
    Unsupported { event_type: String },
}

impl VapiEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::AssistantRequest => "assistant-request",
            Self::FunctionCall { .. } => "function-call",
            Self::EndOfCallReport { .. } => "end-of-call-report",
            Self::Unsupported { event_type } => event_type,
        }
    }
}

/// Parse a webhook envelope. Missing fields default (empty string, empty
/// object) rather than reject.
pub fn parse_webhook(payload: &Value) -> VapiEvent {
    let message = &payload["message"];

    match message["type"].as_str().unwrap_or("") {
        "assistant-request" => VapiEvent::AssistantRequest,
        "function-call" => {
            let call = &message["functionCall"];
            let parameters = if call["parameters"].is_object() {
                call["parameters"].clone()
            } else {
                json!({})
            };
            VapiEvent::FunctionCall {
                name: call["name"].as_str().unwrap_or("").to_string(),
                parameters,
            }
        }
        "end-of-call-report" => VapiEvent::EndOfCallReport {
            call_id: message["call"]["id"].as_str().unwrap_or("").to_string(),
            payload: payload.clone(),
        },
        other => VapiEvent::Unsupported { event_type: other.to_string() },
    }
}

/// Assistant configuration answered to `assistant-request`: the custom-LLM
/// chat callback, voice, opening line, and transcriber. Static per process.
pub fn assistant_config(voice: &VoiceConfig, model: &str, first_message: &str) -> Value {
    json!({
        "assistant": {
            "model": {
                "provider": "custom-llm",
                "url": format!("{}/vapi/chat", voice.public_url.trim_end_matches('/')),
                "model": model
            },
            "voice": {
                "provider": "11labs",
                "voiceId": voice.voice_id
            },
            "firstMessage": first_message,
            "transcriber": {
                "provider": "deepgram",
                "model": "nova-2"
            }
        }
    })
}
