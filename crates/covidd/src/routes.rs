//! API routes for covidd

use crate::dispatch;
use crate::server::AppState;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use covid_shared::{WebhookRequest, WebhookResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Webhook Routes
// ============================================================================

pub fn webhook_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/", post(fulfill))
        .route("/webhook", post(fulfill))
}

async fn fulfill(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<WebhookRequest>,
) -> Json<WebhookResponse> {
    debug!("Webhook request headers: {:?}", headers);
    debug!(
        "Webhook request body: {}",
        serde_json::to_string(&req).unwrap_or_default()
    );

    Json(dispatch::dispatch(req, state.client.as_ref()).await)
}

// ============================================================================
// Health Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
