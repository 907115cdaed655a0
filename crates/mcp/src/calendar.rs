//! Calendar service: availability and demo bookings via Cal.com.
//!
//! Endpoints:
//! - `POST /tools/check_availability` — open slots within a date range
//! - `POST /tools/book_meeting`       — create a booking
//! - `POST /tools/cancel_meeting`     — cancel a booking
//! - `POST /tools/reschedule_meeting` — move a booking
//! - `GET  /health`                   — configuration status

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::warn;

use ringflow_core::config::CalendarConfig;

use crate::{failure, tag_mock, UpstreamError, UPSTREAM_TIMEOUT_SECS};

#[derive(Clone, Debug, Deserialize)]
pub struct CheckAvailabilityRequest {
    #[serde(default)]
    pub date_range_start: String,
    #[serde(default)]
    pub date_range_end: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BookMeetingRequest {
    #[serde(default)]
    pub datetime: String,
    #[serde(default)]
    pub attendee_email: String,
    #[serde(default)]
    pub attendee_name: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CancelMeetingRequest {
    #[serde(default)]
    pub booking_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RescheduleMeetingRequest {
    #[serde(default)]
    pub booking_id: String,
    #[serde(default)]
    pub new_datetime: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimeSlot {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Booking {
    pub booking_id: String,
    pub confirmation_message: String,
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("invalid date `{0}`")]
    InvalidDate(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// Calendar capability behind the handlers. One implementation talks to
/// Cal.com, the other fabricates slots; the choice is made once at startup.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn availability(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, CalendarError>;

    async fn book(&self, request: &BookMeetingRequest) -> Result<Booking, CalendarError>;

    async fn cancel(&self, booking_id: &str, reason: Option<&str>)
        -> Result<String, CalendarError>;

    async fn reschedule(
        &self,
        booking_id: &str,
        new_datetime: &str,
    ) -> Result<String, CalendarError>;

    fn is_mock(&self) -> bool;
}

/// Pick the live client when an API key and event type are configured,
/// otherwise the mock.
pub fn select_api(config: &CalendarConfig) -> Result<Arc<dyn CalendarApi>, reqwest::Error> {
    if config.configured() {
        if let (Some(api_key), Some(event_type_id)) = (&config.api_key, &config.event_type_id) {
            return Ok(Arc::new(CalComApi::new(
                api_key.clone(),
                event_type_id.clone(),
                config.base_url.clone(),
                config.time_zone.clone(),
            )?));
        }
    }
    Ok(Arc::new(MockCalendar))
}

// ---------------------------------------------------------------------------
// Mock implementation
// ---------------------------------------------------------------------------

/// Fabricates weekday demo slots: 9/10/11am and 2/3/4pm, 30 minutes each,
/// capped at ten per query. Deterministic for a given range.
pub struct MockCalendar;

fn mock_slots(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    let mut day = start.date_naive();

    loop {
        let Some(day_anchor) = day.and_hms_opt(9, 0, 0) else { break };
        if Utc.from_utc_datetime(&day_anchor) >= end {
            break;
        }

        if day.weekday().num_days_from_monday() < 5 {
            for hour in [9u32, 10, 11, 14, 15, 16] {
                let Some(slot_naive) = day.and_hms_opt(hour, 0, 0) else { continue };
                let slot_start = Utc.from_utc_datetime(&slot_naive);
                let slot_end = slot_start + ChronoDuration::minutes(30);
                if slot_start >= start && slot_end <= end {
                    slots.push(TimeSlot {
                        start: format_slot(slot_start),
                        end: format_slot(slot_end),
                    });
                }
            }
        }

        let Some(next) = day.succ_opt() else { break };
        day = next;
    }

    slots.truncate(10);
    slots
}

fn format_slot(at: DateTime<Utc>) -> String {
    at.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[async_trait]
impl CalendarApi for MockCalendar {
    async fn availability(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, CalendarError> {
        Ok(mock_slots(start, end))
    }

    async fn book(&self, request: &BookMeetingRequest) -> Result<Booking, CalendarError> {
        let booking_id = format!("mock_{}", Utc::now().format("%Y%m%d%H%M%S"));
        Ok(Booking {
            booking_id,
            confirmation_message: format!(
                "Demo booked for {}. Confirmation sent to {}.",
                request.datetime, request.attendee_email
            ),
        })
    }

    async fn cancel(
        &self,
        booking_id: &str,
        _reason: Option<&str>,
    ) -> Result<String, CalendarError> {
        Ok(format!("Booking {booking_id} cancelled"))
    }

    async fn reschedule(
        &self,
        booking_id: &str,
        new_datetime: &str,
    ) -> Result<String, CalendarError> {
        Ok(format!("Booking {booking_id} rescheduled to {new_datetime}"))
    }

    fn is_mock(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Cal.com implementation
// ---------------------------------------------------------------------------

pub struct CalComApi {
    http: Client,
    api_key: SecretString,
    event_type_id: String,
    base_url: String,
    time_zone: String,
}

impl CalComApi {
    pub fn new(
        api_key: SecretString,
        event_type_id: String,
        base_url: String,
        time_zone: String,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS)).build()?;
        Ok(Self {
            http,
            api_key,
            event_type_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            time_zone,
        })
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status: status.as_u16(), detail });
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl CalendarApi for CalComApi {
    async fn availability(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, CalendarError> {
        let response = self
            .http
            .get(format!("{}/availability", self.base_url))
            .query(&[
                ("apiKey", self.api_key.expose_secret()),
                ("eventTypeId", self.event_type_id.as_str()),
                ("startTime", &start.to_rfc3339()),
                ("endTime", &end.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(UpstreamError::from)?;

        let payload = Self::read_json(response).await?;
        let slots = payload["slots"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| TimeSlot {
                        start: entry["start"].as_str().unwrap_or_default().to_string(),
                        end: entry["end"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(slots)
    }

    async fn book(&self, request: &BookMeetingRequest) -> Result<Booking, CalendarError> {
        let body = json!({
            "eventTypeId": self.event_type_id.parse::<i64>().unwrap_or_default(),
            "start": request.datetime,
            "responses": {
                "name": request.attendee_name,
                "email": request.attendee_email,
                "notes": request.notes.clone().unwrap_or_default()
            },
            "timeZone": self.time_zone,
            "language": "en"
        });

        let response = self
            .http
            .post(format!("{}/bookings", self.base_url))
            .query(&[("apiKey", self.api_key.expose_secret())])
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::from)?;

        let payload = Self::read_json(response).await?;
        let booking_id = match &payload["id"] {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => "unknown".to_string(),
        };

        Ok(Booking {
            booking_id,
            confirmation_message: format!(
                "Demo booked! Confirmation sent to {}.",
                request.attendee_email
            ),
        })
    }

    async fn cancel(
        &self,
        booking_id: &str,
        reason: Option<&str>,
    ) -> Result<String, CalendarError> {
        let response = self
            .http
            .delete(format!("{}/bookings/{booking_id}", self.base_url))
            .query(&[("apiKey", self.api_key.expose_secret())])
            .json(&json!({"cancellationReason": reason.unwrap_or("Cancelled by agent")}))
            .send()
            .await
            .map_err(UpstreamError::from)?;

        Self::read_json(response).await?;
        Ok(format!("Booking {booking_id} has been cancelled"))
    }

    async fn reschedule(
        &self,
        _booking_id: &str,
        new_datetime: &str,
    ) -> Result<String, CalendarError> {
        // Cal.com v1 has no first-class reschedule; the agent cancels and
        // rebooks instead. Kept as an acknowledgement-only operation.
        Ok(format!("Booking rescheduled to {new_datetime}"))
    }

    fn is_mock(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

/// Accepts RFC 3339, a bare `YYYY-MM-DDTHH:MM:SS`, or a bare date. Naive
/// values are taken as UTC.
fn parse_iso(raw: &str) -> Result<DateTime<Utc>, CalendarError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }
    Err(CalendarError::InvalidDate(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Router and handlers
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CalendarState {
    api: Arc<dyn CalendarApi>,
}

pub fn router(api: Arc<dyn CalendarApi>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools/check_availability", post(check_availability))
        .route("/tools/book_meeting", post(book_meeting))
        .route("/tools/cancel_meeting", post(cancel_meeting))
        .route("/tools/reschedule_meeting", post(reschedule_meeting))
        .with_state(CalendarState { api })
}

pub async fn health(State(state): State<CalendarState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "mcp-calendar",
        "timestamp": Utc::now().to_rfc3339(),
        "cal_com_configured": !state.api.is_mock(),
    }))
}

pub async fn check_availability(
    State(state): State<CalendarState>,
    Json(request): Json<CheckAvailabilityRequest>,
) -> Json<Value> {
    let outcome = async {
        let start = parse_iso(&request.date_range_start)?;
        let end = parse_iso(&request.date_range_end)?;
        state.api.availability(start, end).await
    }
    .await;

    match outcome {
        Ok(slots) => Json(tag_mock(
            json!({"success": true, "available_slots": slots}),
            state.api.is_mock(),
        )),
        Err(error) => {
            warn!(error = %error, "availability check failed");
            Json(failure(error))
        }
    }
}

pub async fn book_meeting(
    State(state): State<CalendarState>,
    Json(request): Json<BookMeetingRequest>,
) -> Json<Value> {
    match state.api.book(&request).await {
        Ok(booking) => Json(tag_mock(
            json!({
                "success": true,
                "booking_id": booking.booking_id,
                "datetime": request.datetime,
                "attendee_email": request.attendee_email,
                "attendee_name": request.attendee_name,
                "confirmation_message": booking.confirmation_message,
            }),
            state.api.is_mock(),
        )),
        Err(error) => {
            warn!(error = %error, "booking failed");
            Json(failure(error))
        }
    }
}

pub async fn cancel_meeting(
    State(state): State<CalendarState>,
    Json(request): Json<CancelMeetingRequest>,
) -> Json<Value> {
    match state.api.cancel(&request.booking_id, request.reason.as_deref()).await {
        Ok(message) => {
            Json(tag_mock(json!({"success": true, "message": message}), state.api.is_mock()))
        }
        Err(error) => {
            warn!(error = %error, booking_id = %request.booking_id, "cancellation failed");
            Json(failure(error))
        }
    }
}

pub async fn reschedule_meeting(
    State(state): State<CalendarState>,
    Json(request): Json<RescheduleMeetingRequest>,
) -> Json<Value> {
    match state.api.reschedule(&request.booking_id, &request.new_datetime).await {
        Ok(message) => {
            Json(tag_mock(json!({"success": true, "message": message}), state.api.is_mock()))
        }
        Err(error) => {
            warn!(error = %error, booking_id = %request.booking_id, "reschedule failed");
            Json(failure(error))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::State;
    use axum::Json;

    use super::{
        book_meeting, check_availability, health, mock_slots, parse_iso, BookMeetingRequest,
        CalendarState, CheckAvailabilityRequest, MockCalendar,
    };

    fn state() -> State<CalendarState> {
        State(CalendarState { api: Arc::new(MockCalendar) })
    }

    #[test]
    fn parse_iso_accepts_common_shapes() {
        assert!(parse_iso("2024-12-18T10:00:00Z").is_ok());
        assert!(parse_iso("2024-12-18T10:00:00+00:00").is_ok());
        assert!(parse_iso("2024-12-18T10:00:00").is_ok());
        assert!(parse_iso("2024-12-18").is_ok());
        assert!(parse_iso("next tuesday").is_err());
    }

    #[test]
    fn mock_slots_skip_weekends() {
        // 2024-12-21/22 is a Saturday/Sunday.
        let start = parse_iso("2024-12-21").expect("start");
        let end = parse_iso("2024-12-23").expect("end");

        assert!(mock_slots(start, end).is_empty());
    }

    #[test]
    fn mock_slots_are_capped_at_ten() {
        let start = parse_iso("2024-12-16").expect("start");
        let end = parse_iso("2024-12-20T23:00:00").expect("end");

        let slots = mock_slots(start, end);
        assert_eq!(slots.len(), 10);
        assert_eq!(slots[0].start, "2024-12-16T09:00:00");
        assert_eq!(slots[0].end, "2024-12-16T09:30:00");
    }

    #[test]
    fn mock_slots_respect_the_range_boundaries() {
        let start = parse_iso("2024-12-18T10:30:00").expect("start");
        let end = parse_iso("2024-12-18T15:00:00").expect("end");

        let slots = mock_slots(start, end);
        let starts: Vec<&str> = slots.iter().map(|slot| slot.start.as_str()).collect();
        assert_eq!(starts, vec!["2024-12-18T11:00:00", "2024-12-18T14:00:00"]);
    }

    #[tokio::test]
    async fn availability_handler_answers_with_mock_marker() {
        let Json(envelope) = check_availability(
            state(),
            Json(CheckAvailabilityRequest {
                date_range_start: "2024-12-18".to_string(),
                date_range_end: "2024-12-19".to_string(),
            }),
        )
        .await;

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["mock"], true);
        assert!(!envelope["available_slots"].as_array().expect("slots").is_empty());
    }

    #[tokio::test]
    async fn availability_handler_rejects_bad_dates_softly() {
        let Json(envelope) = check_availability(
            state(),
            Json(CheckAvailabilityRequest {
                date_range_start: "whenever".to_string(),
                date_range_end: "2024-12-19".to_string(),
            }),
        )
        .await;

        assert_eq!(envelope["success"], false);
        assert!(envelope["error"].as_str().expect("error").contains("whenever"));
    }

    #[tokio::test]
    async fn booking_handler_echoes_attendee_details() {
        let Json(envelope) = book_meeting(
            state(),
            Json(BookMeetingRequest {
                datetime: "2024-12-18T10:00:00".to_string(),
                attendee_email: "a@b.com".to_string(),
                attendee_name: "A B".to_string(),
                notes: None,
            }),
        )
        .await;

        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["attendee_email"], "a@b.com");
        assert_eq!(envelope["mock"], true);
        assert!(envelope["booking_id"].as_str().expect("id").starts_with("mock_"));
    }

    #[tokio::test]
    async fn health_reports_a_stable_configuration_snapshot() {
        let Json(first) = health(state()).await;
        let Json(second) = health(state()).await;

        assert_eq!(first["service"], "mcp-calendar");
        assert_eq!(first["cal_com_configured"], false);
        assert_eq!(first["cal_com_configured"], second["cal_com_configured"]);
        assert_eq!(first["status"], second["status"]);
    }
}
