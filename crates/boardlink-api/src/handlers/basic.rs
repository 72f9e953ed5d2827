//! Health endpoints.

use axum::{extract::State, response::Json};

use crate::server::ServerState;

/// Liveness probe.
pub async fn health_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
    }))
}
