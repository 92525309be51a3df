// handlers/public.rs - service index, health and sitemap (no authentication)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::router::route_patterns;
use crate::state::AppState;

/// GET / - service status and the run store it fronts
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "store": state.runs().describe(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health - 200 when the run store answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.runs().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": "ok"
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "store": "unavailable"
                })),
            )
        }
    }
}

/// GET /sitemap - every registered route pattern
pub async fn sitemap() -> Json<Value> {
    Json(json!({ "routes": route_patterns() }))
}
