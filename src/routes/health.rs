use axum::{extract::State, http::StatusCode};
use serde_json::{json, Value};

use crate::{models::envelope::ApiResponse, AppState};

pub async fn health_check(State(state): State<AppState>) -> ApiResponse<Value> {
    match state.auth.store().ping().await {
        Ok(()) => ApiResponse::ok(json!({ "status": "ok", "db": "connected" })),
        Err(e) => {
            tracing::error!("health check failed: {e:#}");
            ApiResponse::error(StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
