//! Ringflow MCP Services - thin tool servers over third-party SaaS APIs
//!
//! Three sibling HTTP services, one module and one binary each:
//! - `calendar` - availability checks and demo bookings (Cal.com)
//! - `crm` - lead lookup, updates, and activity logging (HubSpot)
//! - `n8n` - post-call workflow triggers (n8n webhooks)
//!
//! Each service exposes a handful of `/tools/*` endpoints that translate an
//! inbound JSON request into one outbound call, plus a `/health` endpoint
//! reporting which credentials are present.
//!
//! ## Mock mode
//!
//! A capability trait sits between the handlers and the third-party API,
//! with a live client and a mock implementation chosen once at construction
//! from configuration. When credentials are absent the service keeps
//! answering with plausible data so the orchestrator can be exercised end to
//! end; every fabricated response carries `"mock": true`.

pub mod calendar;
pub mod crm;
pub mod n8n;

use serde_json::{json, Value};
use thiserror::Error;

use ringflow_core::config::LoggingConfig;

/// How long any live client waits on its third-party API.
pub(crate) const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Subscriber setup shared by the three service binaries.
pub fn init_logging(config: &LoggingConfig) {
    use ringflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.format {
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

/// Failure talking to a third-party API. Handlers never propagate this to
/// the HTTP caller; it becomes a `{"success": false, "error": ...}` envelope.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream answered status {status}: {detail}")]
    Status { status: u16, detail: String },
}

/// Stamp the mock marker onto a success envelope when the service is running
/// without credentials.
pub(crate) fn tag_mock(mut envelope: Value, mock: bool) -> Value {
    if mock {
        envelope["mock"] = json!(true);
    }
    envelope
}

pub(crate) fn failure(error: impl std::fmt::Display) -> Value {
    json!({"success": false, "error": error.to_string()})
}
