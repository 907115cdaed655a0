use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::bootstrap::AppState;

/// Configuration-status snapshot. Read-only; safe to poll.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "orchestrator",
        "timestamp": Utc::now().to_rfc3339(),
        "llm_configured": state.config.llm.configured(),
        "voice_configured": state.config.voice.configured(),
        "active_sessions": state.sessions.active_sessions(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use axum::Json;

    use crate::support::{app_state, RecordingExecutor, ScriptedLlm};

    use super::health;

    #[tokio::test]
    async fn health_reports_a_stable_configuration_snapshot() {
        let state = app_state(ScriptedLlm::replying(&[]), RecordingExecutor::with_outcome("ok"));

        let Json(first) = health(State(state.clone())).await;
        let Json(second) = health(State(state)).await;

        assert_eq!(first["status"], "healthy");
        assert_eq!(first["service"], "orchestrator");
        assert_eq!(first["llm_configured"], false);
        assert_eq!(first["voice_configured"], false);
        assert_eq!(first["llm_configured"], second["llm_configured"]);
        assert_eq!(first["voice_configured"], second["voice_configured"]);
        assert_eq!(first["active_sessions"], second["active_sessions"]);
    }
}
