//! Project listing and creation.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use qm_id::{ProjectName, Username};
use qm_scheme::QuotaSubmission;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::quota::{parse_submission, WriteResponse};
use crate::context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/projects", get(list_projects).post(create_project))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<String>,
}

async fn list_projects(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<ProjectsResponse>, ApiError> {
    let projects = state
        .reconciler()
        .list_projects(&ctx)
        .await
        .map_err(|e| ctx.error(e))?;
    Ok(Json(ProjectsResponse { projects }))
}

#[derive(Debug, Deserialize)]
struct CreateProjectQuery {
    project: Option<String>,
    admin: Option<String>,
}

async fn create_project(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<CreateProjectQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<WriteResponse>), ApiError> {
    let project = query
        .project
        .ok_or_else(|| ctx.error(ApiError::missing_parameter("project")))?;
    let project = ProjectName::parse(&project)
        .map_err(|e| ctx.error(ApiError::invalid_name("project", e)))?;
    let admin = query
        .admin
        .ok_or_else(|| ctx.error(ApiError::missing_parameter("admin")))?;
    let admin =
        Username::parse(&admin).map_err(|e| ctx.error(ApiError::invalid_name("admin", e)))?;
    let submission: QuotaSubmission = parse_submission(&ctx, project.as_str(), &body, false)?;

    let outcome = state
        .reconciler()
        .create_project(&ctx, &project, &admin, &submission)
        .await
        .map_err(|e| ctx.error(e))?;

    Ok((
        StatusCode::CREATED,
        Json(WriteResponse::new(
            format!("project '{project}' created with administrator '{admin}'"),
            outcome,
        )),
    ))
}
