//! Request-scoped context extracted from HTTP requests.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use crate::api::authz;
use crate::api::error::ApiError;
use crate::context::RequestContext;
use crate::state::AppState;

/// Query parameters every authorized route accepts.
#[derive(Debug, Deserialize)]
struct AuthQuery {
    cluster: Option<String>,
    token: Option<String>,
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = authz::request_id(&parts.headers);

        let Query(query) = Query::<AuthQuery>::try_from_uri(&parts.uri).map_err(|e| {
            ApiError::bad_request("invalid_query", e.body_text()).with_request_id(&request_id)
        })?;

        let token = authz::bearer_token(&parts.headers, query.token.as_deref(), &request_id)?;
        authz::authorize(state, request_id, query.cluster.as_deref(), &token).await
    }
}

impl RequestContext {
    /// Converts an operation error into a response tagged with this request.
    pub fn error(&self, e: impl Into<ApiError>) -> ApiError {
        e.into().with_request_id(self.request_id.clone())
    }
}
