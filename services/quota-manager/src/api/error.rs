use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use qm_id::IdError;
use qm_reconcile::ReconcileError;
use serde::Serialize;
use tracing::error;

use crate::cluster::ClusterApiError;
use crate::identity::IdentityError;
use crate::reconciler::OperationError;
use crate::registry::RegistryError;

#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    pub code: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl ProblemDetails {
    fn new(status: StatusCode, code: impl Into<String>, detail: impl Into<String>) -> Self {
        let code = code.into();
        let title = status
            .canonical_reason()
            .unwrap_or("Unknown Error")
            .to_string();
        Self {
            r#type: format!("https://quota-manager.dev/problems/{code}"),
            title,
            status: status.as_u16(),
            detail: detail.into(),
            instance: None,
            code,
            request_id: "unknown".to_string(),
            details: None,
        }
    }

    fn set_request_id(&mut self, request_id: impl Into<String>) {
        let request_id = request_id.into();
        self.request_id = request_id.clone();
        if self.instance.is_none() {
            self.instance = Some(request_id);
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub problem: Box<ProblemDetails>,
}

impl ApiError {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        let problem = Box::new(ProblemDetails::new(status, code, message));
        Self { status, problem }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn unauthorized(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code, message)
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn bad_gateway(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, code, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.problem.set_request_id(request_id);
        self
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.problem.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.problem)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

impl From<ClusterApiError> for ApiError {
    fn from(e: ClusterApiError) -> Self {
        match e {
            ClusterApiError::Status { message, .. } => Self::bad_gateway("upstream_error", message),
            ClusterApiError::UnexpectedResponse(_) => Self::bad_gateway("upstream_error", e.to_string()),
            ClusterApiError::Transport(_) | ClusterApiError::Client { .. } => {
                error!(error = %e, "cluster request failed");
                Self::internal("cluster_unavailable", "cluster request failed")
            }
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::QuotaBelowUsage { ref object, ref parameter, .. } => {
                let field = format!("quota.{object}.{parameter}.value");
                let message = e.to_string();
                Self::bad_request("quota_below_usage", message.clone())
                    .with_details(vec![FieldError { field, message }])
            }
            ReconcileError::InconsistentClusterState { .. } => {
                Self::bad_gateway("inconsistent_cluster_state", e.to_string())
            }
            ReconcileError::InvalidClusterQuantity { .. }
            | ReconcileError::MalformedClusterObject { .. } => {
                Self::bad_gateway("upstream_error", e.to_string())
            }
        }
    }
}

impl From<OperationError> for ApiError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::Submission(e) => {
                let field = e.field();
                let message = e.to_string();
                let error = Self::bad_request("invalid_submission", message.clone());
                if field.is_empty() {
                    error
                } else {
                    error.with_details(vec![FieldError { field, message }])
                }
            }
            OperationError::Reconcile(e) => e.into(),
            OperationError::Cluster(e) => e.into(),
            OperationError::ProjectNotManaged(_) => {
                Self::bad_request("project_not_managed", e.to_string())
            }
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidToken => Self::unauthorized("invalid_token", e.to_string()),
            IdentityError::NotQuotaManager { .. } => Self::forbidden("forbidden", e.to_string()),
            IdentityError::Cluster(e) => e.into(),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::UnknownCluster(_) => Self::bad_request("unknown_cluster", e.to_string()),
            other => {
                error!(error = %other, "registry error while serving a request");
                Self::internal("internal_error", "internal error")
            }
        }
    }
}

impl ApiError {
    /// Rejects an invalid name passed as query parameter `param`.
    pub fn invalid_name(param: &str, e: IdError) -> Self {
        let message = e.to_string();
        Self::bad_request("invalid_name", message.clone()).with_details(vec![FieldError {
            field: param.to_string(),
            message,
        }])
    }

    pub fn missing_parameter(param: &str) -> Self {
        Self::bad_request(
            "missing_parameter",
            format!("query parameter '{param}' is required"),
        )
    }
}
