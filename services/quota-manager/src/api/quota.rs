//! Reading and writing a project's quota.

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use qm_id::ProjectName;
use qm_scheme::{OrderedMap, QuantityInput, QuotaSubmission};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::audit;
use crate::context::RequestContext;
use crate::reconciler::WriteOutcome;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/quota", get(read_quota).put(write_quota))
}

#[derive(Debug, Deserialize)]
struct QuotaQuery {
    project: Option<String>,
    #[serde(rename = "dryRun")]
    dry_run: Option<String>,
}

impl QuotaQuery {
    fn project(&self, ctx: &RequestContext) -> Result<ProjectName, ApiError> {
        let project = self
            .project
            .as_deref()
            .ok_or_else(|| ctx.error(ApiError::missing_parameter("project")))?;
        ProjectName::parse(project).map_err(|e| ctx.error(ApiError::invalid_name("project", e)))
    }

    fn dry_run(&self, ctx: &RequestContext) -> Result<bool, ApiError> {
        match self.dry_run.as_deref() {
            None | Some("") | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(other) => Err(ctx.error(ApiError::bad_request(
                "invalid_parameter",
                format!("query parameter 'dryRun' must be true or false, got '{other}'"),
            ))),
        }
    }
}

/// Body returned by successful writes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub message: String,
    pub dry_run: bool,
    pub patched: Vec<String>,
    pub unchanged: Vec<String>,
}

impl WriteResponse {
    pub fn new(message: String, outcome: WriteOutcome) -> Self {
        Self {
            message,
            dry_run: outcome.dry_run,
            patched: outcome.patched,
            unchanged: outcome.unchanged,
        }
    }
}

/// Parses a submission body; a malformed one counts as a rejected write
/// unless the write is a dry run.
pub(crate) fn parse_submission(
    ctx: &RequestContext,
    project: &str,
    body: &[u8],
    dry_run: bool,
) -> Result<QuotaSubmission, ApiError> {
    QuotaSubmission::from_slice(body).map_err(|e| {
        if !dry_run {
            audit::write_rejected(ctx, project, &e);
        }
        ctx.error(crate::reconciler::OperationError::from(e))
    })
}

async fn read_quota(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<QuotaQuery>,
) -> Result<Json<OrderedMap<OrderedMap<QuantityInput>>>, ApiError> {
    let project = query.project(&ctx)?;
    let quota = state
        .reconciler()
        .read_quota(&ctx, &project)
        .await
        .map_err(|e| ctx.error(e))?;
    Ok(Json(quota))
}

async fn write_quota(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<QuotaQuery>,
    body: Bytes,
) -> Result<Json<WriteResponse>, ApiError> {
    let project = query.project(&ctx)?;
    let dry_run = query.dry_run(&ctx)?;
    let submission = parse_submission(&ctx, project.as_str(), &body, dry_run)?;

    let outcome = state
        .reconciler()
        .write_quota(&ctx, &project, &submission, dry_run)
        .await
        .map_err(|e| ctx.error(e))?;

    let message = match (dry_run, outcome.patched.len()) {
        (true, n) => format!("dry run: {n} quota object(s) would be updated in '{project}'"),
        (false, 0) => format!("quota of '{project}' is already up to date"),
        (false, n) => format!("updated {n} quota object(s) in '{project}'"),
    };
    Ok(Json(WriteResponse::new(message, outcome)))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use qm_id::Username;
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use super::*;
    use crate::registry::{Registry, Source};

    #[derive(Clone, Default)]
    struct AuditCount(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for AuditCount {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if event.metadata().target() == audit::TARGET {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn context() -> RequestContext {
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
        let resolved = registry.resolve("dev").unwrap();
        RequestContext {
            request_id: "req_test".to_string(),
            username: Username::parse("alice").unwrap(),
            cluster: resolved.cluster,
            scheme: resolved.scheme,
        }
    }

    #[test]
    fn test_malformed_body_audited_only_for_real_writes() {
        let ctx = context();
        let count = AuditCount::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(count.clone()));

        assert!(parse_submission(&ctx, "team-a", b"{not json", true).is_err());
        assert_eq!(count.0.load(Ordering::SeqCst), 0);

        assert!(parse_submission(&ctx, "team-a", b"{not json", false).is_err());
        assert_eq!(count.0.load(Ordering::SeqCst), 1);
    }
}
