use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/health", get(detailed_health))
}

/// Liveness probe for the hosting platform. Always 200 while the process is up.
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(core_fields(&state).await)
}

async fn detailed_health(State(state): State<AppState>) -> Json<Value> {
    let mut body = core_fields(&state).await;
    body["market_hours"] = json!(state.market_hours);
    body["features"] = json!([
        "CSV-based level monitoring",
        "Discord webhook integration",
        "Market hours awareness",
        "Trading alerts",
    ]);
    Json(body)
}

async fn core_fields(state: &AppState) -> Value {
    let status = *state.monitor_status.read().await;
    json!({
        "status": "healthy",
        "service": state.service,
        "timestamp": Utc::now().with_timezone(&state.tz).to_rfc3339(),
        "timezone": state.tz.name(),
        "monitor_status": status.to_string(),
        "message": format!("{} is {status} and monitoring market levels", state.service),
    })
}
