//! CRM service: lead management via HubSpot.
//!
//! Endpoints:
//! - `POST /tools/get_lead`         — contact lookup
//! - `POST /tools/update_lead`      — contact property patch
//! - `POST /tools/log_activity`     — call engagement with disposition
//! - `POST /tools/create_deal`      — deal associated with the contact
//! - `POST /tools/get_lead_history` — recent call engagements
//! - `GET  /health`                 — configuration status

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use reqwest::{Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use ringflow_core::config::CrmConfig;

use crate::{failure, tag_mock, UpstreamError, UPSTREAM_TIMEOUT_SECS};

#[derive(Clone, Debug, Deserialize)]
pub struct GetLeadRequest {
    #[serde(default)]
    pub lead_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateLeadRequest {
    #[serde(default)]
    pub lead_id: String,
    #[serde(default)]
    pub properties: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogActivityRequest {
    #[serde(default)]
    pub lead_id: String,
    #[serde(default)]
    pub activity_type: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateDealRequest {
    #[serde(default)]
    pub lead_id: String,
    #[serde(default)]
    pub deal_name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub stage: Option<String>,
}

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Lead not found")]
    LeadNotFound,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Map an activity type onto a HubSpot call disposition.
fn call_disposition(activity_type: &str) -> &'static str {
    match activity_type {
        "voicemail" => "LEFT_VOICEMAIL",
        "no_answer" => "NO_ANSWER",
        // call_connected, demo_booked, not_interested, callback_requested
        _ => "CONNECTED",
    }
}

/// CRM capability behind the handlers, selected once at construction.
#[async_trait]
pub trait CrmApi: Send + Sync {
    async fn lead(&self, lead_id: &str) -> Result<Value, CrmError>;

    async fn update_lead(&self, lead_id: &str, properties: &Value) -> Result<(), CrmError>;

    /// Returns the engagement id when the upstream hands one back.
    async fn log_activity(
        &self,
        lead_id: &str,
        activity_type: &str,
        notes: &str,
    ) -> Result<Option<String>, CrmError>;

    async fn create_deal(&self, request: &CreateDealRequest) -> Result<String, CrmError>;

    async fn lead_history(&self, lead_id: &str) -> Result<Vec<Value>, CrmError>;

    fn is_mock(&self) -> bool;
}

pub fn select_api(config: &CrmConfig) -> Result<Arc<dyn CrmApi>, reqwest::Error> {
    if config.configured() {
        if let Some(access_token) = &config.access_token {
            return Ok(Arc::new(HubSpotApi::new(access_token.clone(), config.base_url.clone())?));
        }
    }
    Ok(Arc::new(MockCrm))
}

// ---------------------------------------------------------------------------
// Mock implementation
// ---------------------------------------------------------------------------

pub struct MockCrm;

#[async_trait]
impl CrmApi for MockCrm {
    async fn lead(&self, lead_id: &str) -> Result<Value, CrmError> {
        Ok(json!({
            "id": lead_id,
            "firstname": "John",
            "lastname": "Smith",
            "email": "john.smith@example.com",
            "phone": "+1-555-123-4567",
            "company": "Smith Equipment Co",
            "jobtitle": "Owner",
            "lifecyclestage": "lead",
            "notes": "Interested in pricing tools for their dealership"
        }))
    }

    async fn update_lead(&self, _lead_id: &str, _properties: &Value) -> Result<(), CrmError> {
        Ok(())
    }

    async fn log_activity(
        &self,
        _lead_id: &str,
        _activity_type: &str,
        _notes: &str,
    ) -> Result<Option<String>, CrmError> {
        Ok(None)
    }

    async fn create_deal(&self, _request: &CreateDealRequest) -> Result<String, CrmError> {
        Ok(format!("mock_deal_{}", Utc::now().format("%Y%m%d%H%M%S")))
    }

    async fn lead_history(&self, _lead_id: &str) -> Result<Vec<Value>, CrmError> {
        Ok(vec![
            json!({
                "type": "call",
                "date": "2024-01-10T14:30:00Z",
                "notes": "Initial outreach - left voicemail"
            }),
            json!({
                "type": "email",
                "date": "2024-01-08T10:00:00Z",
                "notes": "Sent intro email"
            }),
        ])
    }

    fn is_mock(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// HubSpot implementation
// ---------------------------------------------------------------------------

pub struct HubSpotApi {
    http: Client,
    access_token: SecretString,
    base_url: String,
}

impl HubSpotApi {
    pub fn new(access_token: SecretString, base_url: String) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS)).build()?;
        Ok(Self { http, access_token, base_url: base_url.trim_end_matches('/').to_string() })
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, UpstreamError> {
        let mut builder = self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.access_token.expose_secret());
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), detail });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl CrmApi for HubSpotApi {
    async fn lead(&self, lead_id: &str) -> Result<Value, CrmError> {
        let path = format!("/crm/v3/objects/contacts/{lead_id}");
        match self.request(Method::GET, &path, None).await {
            Ok(payload) => Ok(payload["properties"].clone()),
            Err(UpstreamError::Status { status: 404, .. }) => Err(CrmError::LeadNotFound),
            Err(error) => Err(error.into()),
        }
    }

    async fn update_lead(&self, lead_id: &str, properties: &Value) -> Result<(), CrmError> {
        let path = format!("/crm/v3/objects/contacts/{lead_id}");
        self.request(Method::PATCH, &path, Some(&json!({"properties": properties}))).await?;
        Ok(())
    }

    async fn log_activity(
        &self,
        lead_id: &str,
        activity_type: &str,
        notes: &str,
    ) -> Result<Option<String>, CrmError> {
        let engagement = json!({
            "properties": {
                "hs_timestamp": Utc::now().to_rfc3339(),
                "hs_call_body": notes,
                "hs_call_disposition": call_disposition(activity_type),
                "hs_call_direction": "OUTBOUND",
                "hs_call_status": "COMPLETED",
                "hs_call_title": format!("Voice Agent Call - {activity_type}")
            },
            "associations": [
                {
                    "to": {"id": lead_id},
                    "types": [
                        {
                            "associationCategory": "HUBSPOT_DEFINED",
                            "associationTypeId": 194
                        }
                    ]
                }
            ]
        });

        let created = self.request(Method::POST, "/crm/v3/objects/calls", Some(&engagement)).await?;

        // A booked demo also advances the contact's lifecycle stage.
        if activity_type == "demo_booked" {
            let path = format!("/crm/v3/objects/contacts/{lead_id}");
            self.request(
                Method::PATCH,
                &path,
                Some(&json!({"properties": {"lifecyclestage": "salesqualifiedlead"}})),
            )
            .await?;
        }

        Ok(created["id"].as_str().map(str::to_string))
    }

    async fn create_deal(&self, request: &CreateDealRequest) -> Result<String, CrmError> {
        let deal = json!({
            "properties": {
                "dealname": request.deal_name,
                "dealstage": request.stage.as_deref().unwrap_or("appointmentscheduled"),
                "pipeline": "default",
                "amount": request.amount.map(|amount| amount.to_string())
            },
            "associations": [
                {
                    "to": {"id": request.lead_id},
                    "types": [
                        {
                            "associationCategory": "HUBSPOT_DEFINED",
                            "associationTypeId": 3
                        }
                    ]
                }
            ]
        });

        let created = self.request(Method::POST, "/crm/v3/objects/deals", Some(&deal)).await?;
        Ok(created["id"].as_str().unwrap_or("unknown").to_string())
    }

    async fn lead_history(&self, lead_id: &str) -> Result<Vec<Value>, CrmError> {
        let path = format!("/crm/v3/objects/contacts/{lead_id}/associations/calls");
        let payload = self.request(Method::GET, &path, None).await?;
        Ok(payload["results"].as_array().cloned().unwrap_or_default())
    }

    fn is_mock(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Router and handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CrmState {
    api: Arc<dyn CrmApi>,
}

pub fn router(api: Arc<dyn CrmApi>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools/get_lead", post(get_lead))
        .route("/tools/update_lead", post(update_lead))
        .route("/tools/log_activity", post(log_activity))
        .route("/tools/create_deal", post(create_deal))
        .route("/tools/get_lead_history", post(get_lead_history))
        .with_state(CrmState { api })
}

pub async fn health(State(state): State<CrmState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "mcp-crm",
        "timestamp": Utc::now().to_rfc3339(),
        "hubspot_configured": !state.api.is_mock(),
    }))
}

pub async fn get_lead(
    State(state): State<CrmState>,
    Json(request): Json<GetLeadRequest>,
) -> Json<Value> {
    match state.api.lead(&request.lead_id).await {
        Ok(lead) => Json(tag_mock(json!({"success": true, "lead": lead}), state.api.is_mock())),
        Err(error) => {
            warn!(error = %error, lead_id = %request.lead_id, "lead lookup failed");
            Json(failure(error))
        }
    }
}

pub async fn update_lead(
    State(state): State<CrmState>,
    Json(request): Json<UpdateLeadRequest>,
) -> Json<Value> {
    match state.api.update_lead(&request.lead_id, &request.properties).await {
        Ok(()) => Json(tag_mock(
            json!({
                "success": true,
                "message": format!("Lead {} updated", request.lead_id),
                "updated_properties": request.properties,
            }),
            state.api.is_mock(),
        )),
        Err(error) => {
            warn!(error = %error, lead_id = %request.lead_id, "lead update failed");
            Json(failure(error))
        }
    }
}

pub async fn log_activity(
    State(state): State<CrmState>,
    Json(request): Json<LogActivityRequest>,
) -> Json<Value> {
    match state.api.log_activity(&request.lead_id, &request.activity_type, &request.notes).await {
        Ok(engagement_id) => {
            let mut envelope = json!({
                "success": true,
                "message": format!("Activity logged for lead {}", request.lead_id),
                "activity_type": request.activity_type,
                "notes": request.notes,
            });
            if let Some(id) = engagement_id {
                envelope["engagement_id"] = json!(id);
            }
            Json(tag_mock(envelope, state.api.is_mock()))
        }
        Err(error) => {
            warn!(error = %error, lead_id = %request.lead_id, "activity logging failed");
            Json(failure(error))
        }
    }
}

pub async fn create_deal(
    State(state): State<CrmState>,
    Json(request): Json<CreateDealRequest>,
) -> Json<Value> {
    match state.api.create_deal(&request).await {
        Ok(deal_id) => Json(tag_mock(
            json!({"success": true, "deal_id": deal_id, "deal_name": request.deal_name}),
            state.api.is_mock(),
        )),
        Err(error) => {
            warn!(error = %error, lead_id = %request.lead_id, "deal creation failed");
            Json(failure(error))
        }
    }
}

pub async fn get_lead_history(
    State(state): State<CrmState>,
    Json(request): Json<GetLeadRequest>,
) -> Json<Value> {
    match state.api.lead_history(&request.lead_id).await {
        Ok(activities) => Json(tag_mock(
            json!({"success": true, "lead_id": request.lead_id, "activities": activities}),
            state.api.is_mock(),
        )),
        Err(error) => {
            warn!(error = %error, lead_id = %request.lead_id, "lead history lookup failed");
            Json(failure(error))
        }
    }
}
