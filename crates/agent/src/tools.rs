use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use ringflow_core::config::ServicesConfig;

use crate::llm::ToolDefinition;

/// The closed set of tools exposed to the model. Adding a tool means adding a
/// variant here and letting the compiler walk every match that must learn
/// about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolName {
    CheckAvailability,
    BookMeeting,
    GetLead,
    UpdateLead,
    LogActivity,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::CheckAvailability,
        ToolName::BookMeeting,
        ToolName::GetLead,
        ToolName::UpdateLead,
        ToolName::LogActivity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckAvailability => "check_availability",
            Self::BookMeeting => "book_meeting",
            Self::GetLead => "get_lead",
            Self::UpdateLead => "update_lead",
            Self::LogActivity => "log_activity",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == raw)
    }
}

/// JSON-schema declarations for every tool, submitted with each model request.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "check_availability".to_string(),
            description: "Check available time slots for booking a demo. Call this when the lead agrees to a demo.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date_range_start": {
                        "type": "string",
                        "description": "Start date for availability check (ISO format, e.g., 2024-01-15)"
                    },
                    "date_range_end": {
                        "type": "string",
                        "description": "End date for availability check (ISO format)"
                    }
                },
                "required": ["date_range_start", "date_range_end"]
            }),
        },
        ToolDefinition {
            name: "book_meeting".to_string(),
            description: "Book a demo meeting with the lead. Call this after confirming a time slot.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "datetime": {
                        "type": "string",
                        "description": "Meeting datetime (ISO format)"
                    },
                    "attendee_email": {
                        "type": "string",
                        "description": "Lead's email address"
                    },
                    "attendee_name": {
                        "type": "string",
                        "description": "Lead's full name"
                    },
                    "notes": {
                        "type": "string",
                        "description": "Any notes about the lead or their needs"
                    }
                },
                "required": ["datetime", "attendee_email", "attendee_name"]
            }),
        },
        ToolDefinition {
            name: "get_lead".to_string(),
            description: "Get information about the lead you're calling.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "lead_id": {
                        "type": "string",
                        "description": "The lead's ID in the CRM"
                    }
                },
                "required": ["lead_id"]
            }),
        },
        ToolDefinition {
            name: "update_lead".to_string(),
            description: "Update lead information in the CRM.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "lead_id": {
                        "type": "string",
                        "description": "The lead's ID"
                    },
                    "properties": {
                        "type": "object",
                        "description": "Properties to update (e.g., email, notes, status)"
                    }
                },
                "required": ["lead_id", "properties"]
            }),
        },
        ToolDefinition {
            name: "log_activity".to_string(),
            description: "Log call activity and notes to the CRM.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "lead_id": {
                        "type": "string",
                        "description": "The lead's ID"
                    },
                    "activity_type": {
                        "type": "string",
                        "enum": ["call_connected", "voicemail", "no_answer", "demo_booked", "not_interested", "callback_requested"],
                        "description": "Type of activity"
                    },
                    "notes": {
                        "type": "string",
                        "description": "Call notes and summary"
                    }
                },
                "required": ["lead_id", "activity_type", "notes"]
            }),
        },
    ]
}

/// Executes one tool invocation against a collaborator service.
///
/// This contract never fails: whatever goes wrong downstream, the caller
/// receives a tagged string it can feed straight back into the model.
#[async_trait]
pub trait ToolExecution: Send + Sync {
    async fn execute(&self, name: &str, arguments: &Value) -> String;
}

#[derive(Clone, Debug)]
pub struct ServiceTargets {
    pub calendar_url: String,
    pub crm_url: String,
}

impl ServiceTargets {
    pub fn from_config(services: &ServicesConfig) -> Self {
        Self {
            calendar_url: services.calendar_url.trim_end_matches('/').to_string(),
            crm_url: services.crm_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Error)]
enum ToolCallError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service answered status {0}")]
    Status(u16),
}

/// Live executor: one POST per invocation to the mapped service endpoint.
/// No retries and no idempotency key, so a model that double-calls
/// `book_meeting` can create duplicate bookings.
pub struct HttpToolExecutor {
    http: Client,
    targets: ServiceTargets,
}

impl HttpToolExecutor {
    pub fn new(targets: ServiceTargets, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, targets })
    }

    fn endpoint(&self, tool: ToolName) -> String {
        let (base, path) = match tool {
            ToolName::CheckAvailability => (&self.targets.calendar_url, "check_availability"),
            ToolName::BookMeeting => (&self.targets.calendar_url, "book_meeting"),
            ToolName::GetLead => (&self.targets.crm_url, "get_lead"),
            ToolName::UpdateLead => (&self.targets.crm_url, "update_lead"),
            ToolName::LogActivity => (&self.targets.crm_url, "log_activity"),
        };
        format!("{base}/tools/{path}")
    }

    async fn call_service(&self, url: &str, arguments: &Value) -> Result<Value, ToolCallError> {
        let response = self.http.post(url).json(arguments).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolCallError::Status(status.as_u16()));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl ToolExecution for HttpToolExecutor {
    async fn execute(&self, name: &str, arguments: &Value) -> String {
        let Some(tool) = ToolName::parse(name) else {
            warn!(tool = %name, "model requested an unknown tool");
            return format!("ERROR: unknown tool `{name}`");
        };

        let url = self.endpoint(tool);
        debug!(tool = tool.as_str(), url = %url, "executing tool invocation");

        match self.call_service(&url, arguments).await {
            Ok(payload) => format_outcome(tool, arguments, &payload),
            Err(error) => {
                warn!(tool = tool.as_str(), error = %error, "tool invocation failed");
                format!("ERROR: {} call failed: {error}", tool.as_str())
            }
        }
    }
}

/// Collapse a collaborator's JSON envelope into the short tagged string the
/// model branches on.
pub fn format_outcome(tool: ToolName, arguments: &Value, payload: &Value) -> String {
    let succeeded = payload["success"].as_bool().unwrap_or(false);
    let error_detail =
        || payload["error"].as_str().unwrap_or("unspecified upstream failure").to_string();

    match tool {
        ToolName::CheckAvailability => {
            if !succeeded {
                return format!("ERROR: {}", error_detail());
            }
            let slots = payload["available_slots"].as_array().cloned().unwrap_or_default();
            if slots.is_empty() {
                return format!(
                    "NO_AVAILABILITY: no open demo slots between {} and {}",
                    arguments["date_range_start"].as_str().unwrap_or("?"),
                    arguments["date_range_end"].as_str().unwrap_or("?"),
                );
            }
            let starts = slots
                .iter()
                .filter_map(|slot| slot["start"].as_str())
                .collect::<Vec<_>>()
                .join(", ");
            format!("AVAILABLE_SLOTS: {starts}")
        }
        ToolName::BookMeeting => {
            if !succeeded {
                return format!("BOOKING_FAILED: {}", error_detail());
            }
            let email = payload["attendee_email"]
                .as_str()
                .or_else(|| arguments["attendee_email"].as_str())
                .unwrap_or("the attendee");
            format!(
                "BOOKING_SUCCESS: booking {} confirmed for {}; confirmation sent to {email}",
                payload["booking_id"].as_str().unwrap_or("unknown"),
                payload["datetime"].as_str().or_else(|| arguments["datetime"].as_str()).unwrap_or("?"),
            )
        }
        ToolName::GetLead => {
            if !succeeded {
                return format!("ERROR: {}", error_detail());
            }
            format!("LEAD_INFO: {}", summarize_lead(&payload["lead"]))
        }
        ToolName::UpdateLead => {
            if !succeeded {
                return format!("ERROR: {}", error_detail());
            }
            let updated = payload["updated_properties"]
                .as_object()
                .map(|properties| properties.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            format!(
                "LEAD_UPDATED: lead {} updated ({updated})",
                arguments["lead_id"].as_str().unwrap_or("unknown"),
            )
        }
        ToolName::LogActivity => {
            if !succeeded {
                return format!("ERROR: {}", error_detail());
            }
            format!(
                "ACTIVITY_LOGGED: {} recorded for lead {}",
                arguments["activity_type"].as_str().unwrap_or("activity"),
                arguments["lead_id"].as_str().unwrap_or("unknown"),
            )
        }
    }
}

fn summarize_lead(lead: &Value) -> String {
    let mut parts = Vec::new();

    let first = lead["firstname"].as_str().unwrap_or("");
    let last = lead["lastname"].as_str().unwrap_or("");
    let name = format!("{first} {last}");
    let name = name.trim();
    if !name.is_empty() {
        parts.push(name.to_string());
    }

    if let Some(title) = lead["jobtitle"].as_str() {
        if let Some(company) = lead["company"].as_str() {
            parts.push(format!("{title} at {company}"));
        } else {
            parts.push(title.to_string());
        }
    } else if let Some(company) = lead["company"].as_str() {
        parts.push(company.to_string());
    }

    for field in ["email", "phone", "lifecyclestage", "notes"] {
        if let Some(value) = lead[field].as_str() {
            parts.push(format!("{field}: {value}"));
        }
    }

    if parts.is_empty() {
        "no details on file".to_string()
    } else {
        parts.join("; ")
    }
}
