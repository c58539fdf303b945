//! Caller authentication and authorization.
//!
//! The caller's token is reviewed on the cluster named by the request, and
//! quota operations additionally require membership of the configured
//! quota-managers group on that same cluster.

use axum::http::HeaderMap;
use qm_id::{RequestId, Username};
use tracing::{debug, info};

use crate::api::error::ApiError;
use crate::context::RequestContext;
use crate::identity;
use crate::registry::ResolvedCluster;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id from the incoming header, or a fresh one.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| RequestId::new().to_string())
}

/// Bearer token from the `Authorization` header, falling back to the
/// `token` query parameter used by browser clients.
pub fn bearer_token(
    headers: &HeaderMap,
    query_token: Option<&str>,
    request_id: &str,
) -> Result<String, ApiError> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        let value = value.to_str().unwrap_or_default().trim();
        let Some(token) = value.strip_prefix("Bearer ") else {
            return Err(ApiError::unauthorized(
                "invalid_authorization",
                "Authorization must be a Bearer token",
            )
            .with_request_id(request_id));
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::unauthorized(
                "invalid_authorization",
                "Authorization Bearer token cannot be empty",
            )
            .with_request_id(request_id));
        }
        return Ok(token.to_string());
    }

    query_token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::unauthorized("missing_token", "a bearer token is required")
                .with_request_id(request_id)
        })
}

/// Resolves the cluster and reviews the caller's token on it.
pub async fn authenticate(
    state: &AppState,
    request_id: &str,
    cluster: Option<&str>,
    token: &str,
) -> Result<(ResolvedCluster, Username), ApiError> {
    let cluster = cluster
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::missing_parameter("cluster").with_request_id(request_id))?;
    let resolved = state
        .registry()
        .resolve(cluster)
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;

    let username = identity::authenticate(state.cluster_api(), &resolved.cluster, token)
        .await
        .map_err(|e| ApiError::from(e).with_request_id(request_id))?;
    debug!(request_id, cluster = %resolved.cluster.id, user = %username, "caller authenticated");

    Ok((resolved, username))
}

/// Authenticates the caller and requires quota-manager membership.
pub async fn authorize(
    state: &AppState,
    request_id: String,
    cluster: Option<&str>,
    token: &str,
) -> Result<RequestContext, ApiError> {
    let (resolved, username) = authenticate(state, &request_id, cluster, token).await?;

    if let Err(e) = identity::require_group_member(
        state.cluster_api(),
        &resolved.cluster,
        state.quota_managers_group(),
        &username,
    )
    .await
    {
        info!(
            request_id = %request_id,
            cluster = %resolved.cluster.id,
            user = %username,
            error = %e,
            "quota access denied"
        );
        return Err(ApiError::from(e).with_request_id(request_id));
    }

    Ok(RequestContext {
        request_id,
        username,
        cluster: resolved.cluster,
        scheme: resolved.scheme,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(authorization: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = authorization {
            headers.insert(
                axum::http::header::AUTHORIZATION,
                HeaderValue::from_static(value),
            );
        }
        headers
    }

    #[test]
    fn test_header_token_wins() {
        let token = bearer_token(&headers(Some("Bearer abc")), Some("query"), "req").unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn test_query_token_fallback() {
        let token = bearer_token(&headers(None), Some("query"), "req").unwrap();
        assert_eq!(token, "query");
    }

    #[test]
    fn test_missing_token() {
        let err = bearer_token(&headers(None), None, "req").unwrap_err();
        assert_eq!(err.problem.code, "missing_token");
        assert_eq!(err.problem.request_id, "req");
    }

    #[test]
    fn test_non_bearer_scheme() {
        let err = bearer_token(&headers(Some("Basic abc")), None, "req").unwrap_err();
        assert_eq!(err.problem.code, "invalid_authorization");
    }

    #[test]
    fn test_request_id_header_is_kept() {
        let mut h = HeaderMap::new();
        h.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req_given"));
        assert_eq!(request_id(&h), "req_given");
        assert!(request_id(&HeaderMap::new()).starts_with("req_"));
    }
}
