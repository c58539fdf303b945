//! Health check endpoint.
//!
//! Used by load balancers and orchestration probes. Bypasses authentication
//! and request logging.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" once the server is listening.
    pub status: String,

    pub service: String,
    pub version: String,

    /// Current timestamp (RFC 3339).
    pub timestamp: String,

    /// Number of registered clusters.
    pub clusters: usize,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "quota-manager".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        clusters: state.registry().cluster_count(),
    })
}
