//! HTTP API handlers and routing.

mod authz;
mod clusters;
pub mod error;
mod health;
mod projects;
mod quota;
mod request_context;
mod scheme;

pub use clusters::{ClusterSummary, UsernameResponse};
pub use health::HealthResponse;
pub use projects::ProjectsResponse;
pub use quota::WriteResponse;
pub use scheme::StringRule;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_origin(Any);

    Router::new()
        .merge(clusters::routes())
        .merge(projects::routes())
        .merge(quota::routes())
        .merge(scheme::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Merged after the layers so probes are not request-logged.
        .merge(health::routes())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::cluster::MockClusterApi;
    use crate::config::{ManagedLabel, UsernameFormat};
    use crate::reconciler::QuotaReconciler;
    use crate::registry::{Registry, Source};

    fn router() -> Router {
        let registry = Registry::load(
            vec![Source::new(
                "standard.json",
                r#"{"name": "standard", "version": 1, "quota": {"pods": {"count":
                    {"displayName": "Pods", "allowedUnits": "", "valueType": "integer"}}}}"#,
            )],
            vec![Source::new(
                "dev.json",
                r#"{"displayName": "Dev", "apiEndpoint": "https://mock", "isProduction": false,
                    "credentialToken": "t", "schemeRef": "standard"}"#,
            )],
        )
        .unwrap();
        let api = Arc::new(MockClusterApi::new());
        let reconciler = QuotaReconciler::new(
            api.clone(),
            ManagedLabel {
                name: "quota.example.com/managed".parse().unwrap(),
                value: "true".to_string(),
            },
            UsernameFormat::default(),
        );
        create_router(AppState::new(
            Arc::new(registry),
            api,
            reconciler,
            "quota-managers",
        ))
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.service, "quota-manager");
        assert_eq!(health.clusters, 1);
    }

    #[tokio::test]
    async fn test_quota_requires_token() {
        let response = router()
            .oneshot(
                Request::get("/quota?cluster=dev&project=team-a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/problem+json"
        );
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = router()
            .oneshot(Request::get("/v1/apps").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
