//! Public cluster and identity lookups.

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::authz;
use crate::api::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clusters", get(list_clusters))
        .route("/username", get(username))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub display_name: String,
    pub production: bool,
}

/// Registered clusters keyed by id. Credentials and endpoints stay private.
async fn list_clusters(State(state): State<AppState>) -> Json<BTreeMap<String, ClusterSummary>> {
    Json(
        state
            .registry()
            .clusters()
            .map(|c| {
                (
                    c.id.to_string(),
                    ClusterSummary {
                        display_name: c.display_name.clone(),
                        production: c.is_production,
                    },
                )
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct UsernameQuery {
    cluster: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsernameResponse {
    pub username: String,
}

/// Who the caller's token belongs to on a cluster. No group check.
async fn username(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UsernameResponse>, ApiError> {
    let request_id = authz::request_id(&headers);
    let token = authz::bearer_token(&headers, query.token.as_deref(), &request_id)?;
    let (_, username) =
        authz::authenticate(&state, &request_id, query.cluster.as_deref(), &token).await?;
    Ok(Json(UsernameResponse {
        username: username.to_string(),
    }))
}
