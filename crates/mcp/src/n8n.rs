//! Workflow bridge: post-call automations via n8n webhooks.
//!
//! Endpoints:
//! - `POST /tools/trigger_workflow`  — fire any workflow by id or direct path
//! - `POST /tools/log_call_outcome`  — route a finished call to its workflow
//! - `POST /tools/send_notification` — alert via the notification workflow
//! - `GET  /health`                  — configuration status

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use ringflow_core::config::WorkflowsConfig;

use crate::{failure, UpstreamError, UPSTREAM_TIMEOUT_SECS};

#[derive(Clone, Debug, Deserialize)]
pub struct TriggerWorkflowRequest {
    #[serde(default)]
    pub workflow_id: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogCallOutcomeRequest {
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub lead_id: Option<String>,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub transcript: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub demo_datetime: Option<String>,
    #[serde(default)]
    pub attendee_email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Full voice-provider report, forwarded untouched.
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SendNotificationRequest {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_priority")]
    pub priority: String,
}

fn default_priority() -> String {
    "normal".to_string()
}

const WEBHOOK_POST_CALL_SUMMARY: &str = "/webhook/post-call-summary";

/// Webhook path for a known workflow id; unknown ids resolve to a direct
/// `/webhook/<id>` path so new n8n workflows need no redeploy here.
pub fn workflow_path(workflow_id: &str) -> String {
    match workflow_id {
        "post_call_summary" => WEBHOOK_POST_CALL_SUMMARY.to_string(),
        "demo_booked" => "/webhook/demo-booked".to_string(),
        "no_answer" => "/webhook/no-answer".to_string(),
        "not_interested" => "/webhook/not-interested".to_string(),
        "callback_requested" => "/webhook/callback-requested".to_string(),
        other => format!("/webhook/{other}"),
    }
}

/// Which workflow a call outcome routes to. Anything unrecognized falls back
/// to the plain summary workflow.
pub fn outcome_workflow(outcome: &str) -> &'static str {
    match outcome {
        "demo_booked" => "demo_booked",
        "not_interested" => "not_interested",
        "callback_requested" => "callback_requested",
        "no_answer" | "voicemail" => "no_answer",
        _ => "post_call_summary",
    }
}

/// Workflow-trigger capability, selected once at construction.
#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    /// Fire one webhook. The returned value is the per-trigger result
    /// envelope reported back to the caller.
    async fn trigger(&self, webhook_path: &str, payload: &Value) -> Result<Value, UpstreamError>;

    fn is_mock(&self) -> bool;
}

pub fn select_trigger(config: &WorkflowsConfig) -> Result<Arc<dyn WorkflowTrigger>, reqwest::Error> {
    if config.configured() {
        if let Some(base_url) = &config.webhook_base_url {
            return Ok(Arc::new(N8nTrigger::new(
                base_url.clone(),
                config.webhook_secret.clone(),
            )?));
        }
    }
    Ok(Arc::new(MockTrigger))
}

pub struct MockTrigger;

#[async_trait]
impl WorkflowTrigger for MockTrigger {
    async fn trigger(&self, webhook_path: &str, _payload: &Value) -> Result<Value, UpstreamError> {
        Ok(json!({
            "success": true,
            "mock": true,
            "message": format!("Would trigger webhook: {webhook_path}")
        }))
    }

    fn is_mock(&self) -> bool {
        true
    }
}

pub struct N8nTrigger {
    http: Client,
    base_url: String,
    secret: Option<SecretString>,
}

impl N8nTrigger {
    pub fn new(base_url: String, secret: Option<SecretString>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS)).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string(), secret })
    }
}

#[async_trait]
impl WorkflowTrigger for N8nTrigger {
    async fn trigger(&self, webhook_path: &str, payload: &Value) -> Result<Value, UpstreamError> {
        let mut builder = self.http.post(format!("{}{webhook_path}", self.base_url)).json(payload);
        if let Some(secret) = &self.secret {
            builder = builder.header("X-Webhook-Secret", secret.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), detail });
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = if body.is_empty() {
            json!({})
        } else {
            serde_json::from_str(&body).unwrap_or(json!({}))
        };

        Ok(json!({
            "success": true,
            "status_code": status.as_u16(),
            "response": parsed
        }))
    }

    fn is_mock(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Router and handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct N8nState {
    trigger: Arc<dyn WorkflowTrigger>,
}

pub fn router(trigger: Arc<dyn WorkflowTrigger>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools/trigger_workflow", post(trigger_workflow))
        .route("/tools/log_call_outcome", post(log_call_outcome))
        .route("/tools/send_notification", post(send_notification))
        .with_state(N8nState { trigger })
}

pub async fn health(State(state): State<N8nState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "mcp-n8n",
        "timestamp": Utc::now().to_rfc3339(),
        "n8n_configured": !state.trigger.is_mock(),
    }))
}

pub async fn trigger_workflow(
    State(state): State<N8nState>,
    Json(request): Json<TriggerWorkflowRequest>,
) -> Json<Value> {
    let path = workflow_path(&request.workflow_id);
    match state.trigger.trigger(&path, &request.payload).await {
        Ok(result) => Json(json!({
            "success": true,
            "workflow_id": request.workflow_id,
            "result": result
        })),
        Err(error) => {
            warn!(error = %error, workflow_id = %request.workflow_id, "workflow trigger failed");
            Json(failure(format!("Failed to trigger workflow: {error}")))
        }
    }
}

pub async fn log_call_outcome(
    State(state): State<N8nState>,
    Json(request): Json<LogCallOutcomeRequest>,
) -> Json<Value> {
    let mut payload = json!({
        "call_id": request.call_id,
        "lead_id": request.lead_id,
        "outcome": request.outcome,
        "duration_seconds": request.duration_seconds,
        "transcript": request.transcript,
        "summary": request.summary,
        "notes": request.notes,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let Some(demo_datetime) = &request.demo_datetime {
        payload["demo_datetime"] = json!(demo_datetime);
    }
    if let Some(attendee_email) = &request.attendee_email {
        payload["attendee_email"] = json!(attendee_email);
    }
    if let Some(provider_payload) = &request.payload {
        payload["vapi_payload"] = provider_payload.clone();
    }

    let workflow_id = outcome_workflow(&request.outcome);

    // The summary workflow always fires; the outcome-specific one fires on
    // top when it is a different workflow.
    let summary_result = state.trigger.trigger(WEBHOOK_POST_CALL_SUMMARY, &payload).await;
    let summary_result = match summary_result {
        Ok(result) => result,
        Err(error) => {
            warn!(error = %error, call_id = %request.call_id, "post-call summary trigger failed");
            return Json(failure(error));
        }
    };

    let mut triggered = json!({ "post_call_summary": summary_result });
    if workflow_id != "post_call_summary" {
        match state.trigger.trigger(&workflow_path(workflow_id), &payload).await {
            Ok(result) => {
                triggered[workflow_id] = result;
            }
            Err(error) => {
                warn!(error = %error, call_id = %request.call_id, workflow_id, "outcome workflow trigger failed");
                return Json(failure(error));
            }
        }
    }

    Json(json!({
        "success": true,
        "call_id": request.call_id,
        "outcome": request.outcome,
        "workflows_triggered": triggered
    }))
}

pub async fn send_notification(
    State(state): State<N8nState>,
    Json(request): Json<SendNotificationRequest>,
) -> Json<Value> {
    let payload = json!({
        "channel": request.channel,
        "message": request.message,
        "priority": request.priority,
        "timestamp": Utc::now().to_rfc3339(),
    });

    match state.trigger.trigger("/webhook/notification", &payload).await {
        Ok(result) => Json(json!({
            "success": true,
            "channel": request.channel,
            "result": result
        })),
        Err(error) => {
            warn!(error = %error, channel = %request.channel, "notification trigger failed");
            Json(failure(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::Json;
    use serde_json::json;

    use super::{
        health, log_call_outcome, outcome_workflow, send_notification, trigger_workflow,
        workflow_path, LogCallOutcomeRequest, MockTrigger, N8nState, SendNotificationRequest,
        TriggerWorkflowRequest,
    };

    fn state() -> State<N8nState> {
        State(N8nState { trigger: Arc::new(MockTrigger) })
    }

    #[test]
    fn known_workflows_have_fixed_paths_and_unknown_ids_fall_through() {
        assert_eq!(workflow_path("post_call_summary"), "/webhook/post-call-summary");
        assert_eq!(workflow_path("demo_booked"), "/webhook/demo-booked");
        assert_eq!(workflow_path("lost-deal-recovery"), "/webhook/lost-deal-recovery");
    }

    #[test]
    fn outcomes_route_to_their_workflows() {
        assert_eq!(outcome_workflow("demo_booked"), "demo_booked");
        assert_eq!(outcome_workflow("voicemail"), "no_answer");
        assert_eq!(outcome_workflow("no_answer"), "no_answer");
        assert_eq!(outcome_workflow("hung_up_midword"), "post_call_summary");
    }

    #[tokio::test]
    async fn call_outcome_fires_summary_and_outcome_workflows() {
        let Json(envelope) = log_call_outcome(
            state(),
            Json(LogCallOutcomeRequest {
                call_id: "call-1".to_string(),
                lead_id: Some("lead-9".to_string()),
                outcome: "demo_booked".to_string(),
                duration_seconds: Some(312),
                transcript: None,
                summary: Some("Lead agreed to a Wednesday demo".to_string()),
                demo_datetime: Some("2024-12-18T10:00:00".to_string()),
                attendee_email: Some("a@b.com".to_string()),
                notes: None,
                payload: None,
            }),
        )
        .await;

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["outcome"], "demo_booked");
        let triggered = envelope["workflows_triggered"].as_object().expect("map");
        assert!(triggered.contains_key("post_call_summary"));
        assert!(triggered.contains_key("demo_booked"));
        assert_eq!(triggered["demo_booked"]["mock"], true);
    }

    #[tokio::test]
    async fn unrecognized_outcome_only_fires_the_summary_workflow() {
        let Json(envelope) = log_call_outcome(
            state(),
            Json(LogCallOutcomeRequest {
                call_id: "call-2".to_string(),
                lead_id: None,
                outcome: "carrier_dropped".to_string(),
                duration_seconds: None,
                transcript: None,
                summary: None,
                demo_datetime: None,
                attendee_email: None,
                notes: None,
                payload: Some(json!({"message": {"type": "end-of-call-report"}})),
            }),
        )
        .await;

        assert_eq!(envelope["success"], true);
        let triggered = envelope["workflows_triggered"].as_object().expect("map");
        assert_eq!(triggered.len(), 1);
        assert!(triggered.contains_key("post_call_summary"));
    }

    #[tokio::test]
    async fn generic_trigger_resolves_direct_paths() {
        let Json(envelope) = trigger_workflow(
            state(),
            Json(TriggerWorkflowRequest {
                workflow_id: "weekly-digest".to_string(),
                payload: json!({"week": 51}),
            }),
        )
        .await;

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["workflow_id"], "weekly-digest");
        assert!(envelope["result"]["message"]
            .as_str()
            .expect("message")
            .contains("/webhook/weekly-digest"));
    }

    #[tokio::test]
    async fn notifications_go_through_the_notification_webhook() {
        let Json(envelope) = send_notification(
            state(),
            Json(SendNotificationRequest {
                channel: "slack".to_string(),
                message: "High-value demo booked".to_string(),
                priority: "high".to_string(),
            }),
        )
        .await;

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["channel"], "slack");
        assert!(envelope["result"]["message"]
            .as_str()
            .expect("message")
            .contains("/webhook/notification"));
    }

    #[tokio::test]
    async fn health_reports_a_stable_configuration_snapshot() {
        let Json(first) = health(state()).await;
        let Json(second) = health(state()).await;

        assert_eq!(first["service"], "mcp-n8n");
        assert_eq!(first["n8n_configured"], false);
        assert_eq!(first["n8n_configured"], second["n8n_configured"]);
    }
}
